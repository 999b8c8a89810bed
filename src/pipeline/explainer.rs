use std::sync::Arc;
use tracing::{info, warn};

use crate::llm::models::GeneratedExplanations;
use crate::llm::{generate_object, GenerationRequest, LlmError, TextGenerator};
use crate::pipeline::safety::ExecutableStatement;
use crate::pipeline::schema::SchemaDescription;
use crate::pipeline::types::{Explanation, ExplanationFragment, NaturalLanguageQuery};

/// Breaks a validated statement into annotated fragments for the UI.
pub struct QueryExplainer {
    generator: Arc<dyn TextGenerator>,
    schema: Arc<SchemaDescription>,
}

impl QueryExplainer {
    pub fn new(generator: Arc<dyn TextGenerator>, schema: Arc<SchemaDescription>) -> Self {
        Self { generator, schema }
    }

    fn system_prompt(&self) -> String {
        format!(
            r#"You are a SQL (PostgreSQL/DuckDB) expert. Your job is to explain to the user the SQL query you wrote to retrieve the data they asked for. The table schema is as follows:

{ddl}

When explaining, break the query into logical sections (SELECT, FROM, WHERE, GROUP BY, ORDER BY, etc.) and describe the purpose of each. Every "fragment" must be copied verbatim from the query, in the order it appears, without overlapping another fragment. Provide concise explanations in Brazilian Portuguese (pt-BR) suitable for a non-expert.

Example of explanation style:
- SELECT: Aqui selecionamos os campos que queremos mostrar
- WHERE: Filtramos os dados para mostrar apenas...
- GROUP BY: Agrupamos os resultados por...
"#,
            ddl = self.schema.to_ddl()
        )
    }

    pub async fn explain(
        &self,
        question: &NaturalLanguageQuery,
        stmt: &ExecutableStatement,
    ) -> Result<Explanation, LlmError> {
        info!("Explaining statement for question: {}", question);

        let request = GenerationRequest {
            system: self.system_prompt(),
            prompt: format!(
                "Explain the SQL query you generated to retrieve the data the user wanted. Assume the user is not an expert in SQL. Break down the query into steps. Be concise.\n\nUser Query:\n{}\n\nGenerated SQL Query:\n{}",
                question, stmt
            ),
            schema_name: "query_explanations",
            schema: GeneratedExplanations::json_schema(),
        };

        let generated: GeneratedExplanations = generate_object(self.generator.as_ref(), &request).await?;
        locate_fragments(stmt.as_str(), generated.explanations)
    }
}

/// Trims each fragment and checks the sequence can be found in `sql` in order
/// without overlap.
pub fn locate_fragments(
    sql: &str,
    fragments: Vec<ExplanationFragment>,
) -> Result<Explanation, LlmError> {
    if fragments.is_empty() {
        return Err(LlmError::InvalidPayload("explanation has no fragments".to_string()));
    }

    let mut cursor = 0;
    let mut located = Vec::with_capacity(fragments.len());
    for item in fragments {
        let fragment = item.fragment.trim();
        if fragment.is_empty() {
            return Err(LlmError::InvalidPayload("explanation contains an empty fragment".to_string()));
        }
        match sql[cursor..].find(fragment) {
            Some(offset) => cursor += offset + fragment.len(),
            None => {
                warn!("Fragment not found in statement after byte {}: {}", cursor, fragment);
                return Err(LlmError::InvalidPayload(format!(
                    "fragment '{}' is not a verbatim part of the query",
                    fragment
                )));
            }
        }
        located.push(ExplanationFragment {
            fragment: fragment.to_string(),
            description: item.description.trim().to_string(),
        });
    }

    Ok(located)
}
