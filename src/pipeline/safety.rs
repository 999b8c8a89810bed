use serde::Serialize;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::tokenizer::{Token, Tokenizer, Whitespace};
use std::fmt;
use tracing::{debug, warn};

use crate::pipeline::error::SafetyError;
use crate::pipeline::types::SqlStatement;

/// Keywords that may not appear as bare words anywhere in a statement.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "DROP", "DELETE", "INSERT", "UPDATE", "ALTER", "TRUNCATE", "CREATE", "GRANT", "REVOKE",
];

/// A statement that passed [`QuerySafetyGate::validate`]. Only the gate can build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExecutableStatement(String);

impl ExecutableStatement {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExecutableStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static read-only check over the statement's tokens.
///
/// Keywords are matched as whole, unquoted word tokens, so string literals,
/// quoted identifiers, comments and identifiers such as `update_date` never
/// trigger a rejection. The first token must be `SELECT` and a `;` may only
/// be followed by whitespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuerySafetyGate;

impl QuerySafetyGate {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(&self, candidate: &SqlStatement) -> Result<ExecutableStatement, SafetyError> {
        let sql = candidate.as_str().trim();
        if sql.is_empty() {
            return Err(SafetyError::Empty);
        }

        let dialect = DuckDbDialect {};
        let tokens = Tokenizer::new(&dialect, sql)
            .tokenize()
            .map_err(|e| SafetyError::Unreadable(e.to_string()))?;

        let result = check_tokens(&tokens);
        match &result {
            Ok(()) => debug!("Statement accepted by safety gate"),
            Err(e) => warn!("Statement rejected by safety gate: {} - {}", e, sql),
        }
        result.map(|_| ExecutableStatement(sql.to_string()))
    }
}

fn is_plain_whitespace(token: &Token) -> bool {
    matches!(
        token,
        Token::Whitespace(Whitespace::Space | Whitespace::Newline | Whitespace::Tab)
    )
}

fn check_tokens(tokens: &[Token]) -> Result<(), SafetyError> {
    let mut significant = tokens.iter().filter(|t| !is_plain_whitespace(t));

    match significant.next() {
        Some(Token::Word(word)) if word.quote_style.is_none() && word.value.eq_ignore_ascii_case("SELECT") => {}
        Some(other) => return Err(SafetyError::NotASelect(other.to_string())),
        None => return Err(SafetyError::Empty),
    }

    let mut after_separator = false;
    for token in tokens {
        if after_separator && !is_plain_whitespace(token) {
            return Err(SafetyError::MultipleStatements);
        }
        match token {
            Token::SemiColon => after_separator = true,
            Token::Word(word) if word.quote_style.is_none() => {
                if let Some(kw) = FORBIDDEN_KEYWORDS
                    .iter()
                    .find(|kw| word.value.eq_ignore_ascii_case(kw))
                {
                    return Err(SafetyError::ForbiddenKeyword(kw.to_string()));
                }
            }
            _ => {}
        }
    }

    Ok(())
}
