use std::error::Error;
use std::fmt;

use crate::llm::LlmError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyError {
    Empty,
    NotASelect(String),
    ForbiddenKeyword(String),
    MultipleStatements,
    Unreadable(String),
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyError::Empty => write!(f, "empty statement"),
            SafetyError::NotASelect(found) => write!(f, "statement must start with SELECT, found '{}'", found),
            SafetyError::ForbiddenKeyword(kw) => write!(f, "forbidden keyword '{}'", kw),
            SafetyError::MultipleStatements => write!(f, "multiple statements are not allowed"),
            SafetyError::Unreadable(msg) => write!(f, "statement could not be tokenized: {}", msg),
        }
    }
}

impl Error for SafetyError {}

#[derive(Debug)]
pub enum ExecutionError {
    /// The queried relation does not exist; the schema has not been provisioned.
    SchemaMissing { relation: String },
    Store(String),
    Pool(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::SchemaMissing { relation } => write!(f, "relation '{}' does not exist", relation),
            ExecutionError::Store(msg) => write!(f, "database error: {}", msg),
            ExecutionError::Pool(msg) => write!(f, "connection pool error: {}", msg),
        }
    }
}

impl Error for ExecutionError {}

impl From<duckdb::Error> for ExecutionError {
    fn from(err: duckdb::Error) -> Self {
        let message = err.to_string();
        match missing_relation(&message) {
            Some(relation) => ExecutionError::SchemaMissing { relation },
            None => ExecutionError::Store(message),
        }
    }
}

impl From<r2d2::Error> for ExecutionError {
    fn from(err: r2d2::Error) -> Self {
        ExecutionError::Pool(err.to_string())
    }
}

/// Recognizes DuckDB's and Postgres' "no such table" messages.
pub(crate) fn missing_relation(message: &str) -> Option<String> {
    static PATTERN: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = PATTERN.get_or_init(|| {
        regex::Regex::new(r#"(?i)(?:table with name|relation)\s+"?([A-Za-z0-9_.]+)"?\s+does not exist"#)
            .expect("valid regex")
    });
    re.captures(message).map(|caps| caps[1].to_string())
}

#[derive(Debug)]
pub enum SynthesisError {
    NoRows,
    NoColumns,
    TooFewColumns(usize),
    NoQuantitativeColumn,
    UnknownColumn(String),
    NonNumericSeries(String),
    NoSeries,
    Planner(LlmError),
}

impl fmt::Display for SynthesisError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SynthesisError::NoRows => write!(f, "result set has no rows"),
            SynthesisError::NoColumns => write!(f, "result set has no columns"),
            SynthesisError::TooFewColumns(n) => write!(f, "need at least two columns to chart, got {}", n),
            SynthesisError::NoQuantitativeColumn => write!(f, "result set has no quantitative column"),
            SynthesisError::UnknownColumn(c) => write!(f, "chart references unknown column '{}'", c),
            SynthesisError::NonNumericSeries(c) => write!(f, "series '{}' is not quantitative", c),
            SynthesisError::NoSeries => write!(f, "chart has no series to plot"),
            SynthesisError::Planner(e) => write!(f, "chart planner failed: {}", e),
        }
    }
}

impl Error for SynthesisError {}

#[derive(Debug)]
pub enum PipelineError {
    InvalidQuestion(String),
    /// Caller-supplied rows that do not share one set of columns.
    InconsistentRows { row: usize },
    Generation(LlmError),
    Safety(SafetyError),
    Execution(ExecutionError),
    Synthesis(SynthesisError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::InvalidQuestion(msg) => write!(f, "invalid question: {}", msg),
            PipelineError::InconsistentRows { row } => {
                write!(f, "row {} does not have the same columns as the first row", row)
            }
            PipelineError::Generation(e) => write!(f, "generation failed: {}", e),
            PipelineError::Safety(e) => write!(f, "unsafe statement: {}", e),
            PipelineError::Execution(e) => write!(f, "execution failed: {}", e),
            PipelineError::Synthesis(e) => write!(f, "chart synthesis failed: {}", e),
        }
    }
}

impl Error for PipelineError {}

impl From<LlmError> for PipelineError {
    fn from(err: LlmError) -> Self {
        PipelineError::Generation(err)
    }
}

impl From<SafetyError> for PipelineError {
    fn from(err: SafetyError) -> Self {
        PipelineError::Safety(err)
    }
}

impl From<ExecutionError> for PipelineError {
    fn from(err: ExecutionError) -> Self {
        PipelineError::Execution(err)
    }
}

impl From<SynthesisError> for PipelineError {
    fn from(err: SynthesisError) -> Self {
        PipelineError::Synthesis(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_duckdb_missing_table() {
        let msg = "Catalog Error: Table with name alunos does not exist!\nDid you mean \"temp.information_schema.columns\"?";
        assert_eq!(missing_relation(msg).as_deref(), Some("alunos"));
    }

    #[test]
    fn recognizes_postgres_missing_relation() {
        let msg = "error returned from database: relation \"alunos\" does not exist";
        assert_eq!(missing_relation(msg).as_deref(), Some("alunos"));
    }

    #[test]
    fn other_errors_are_not_schema_missing() {
        assert_eq!(missing_relation("Binder Error: Referenced column \"idade\" not found"), None);
    }
}
