use std::sync::Arc;
use tracing::{debug, info};

use crate::llm::models::GeneratedQuery;
use crate::llm::{generate_object, strip_code_fences, GenerationRequest, LlmError, TextGenerator};
use crate::pipeline::schema::SchemaDescription;
use crate::pipeline::types::{NaturalLanguageQuery, SqlStatement};

/// Turns a question into a candidate SELECT over the fixed schema.
pub struct QueryTranslator {
    generator: Arc<dyn TextGenerator>,
}

impl QueryTranslator {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    fn system_prompt(&self, schema: &SchemaDescription) -> String {
        format!(
            r#"You are a SQL (PostgreSQL/DuckDB) and data visualization expert. Your job is to help the user write a SQL query to retrieve the data they need. The table schema is as follows:

{ddl}

Only retrieval queries (SELECT) are allowed. Return exactly one statement and no comments.

Use ILIKE with LOWER() for string comparisons, e.g.:
  LOWER(curso) ILIKE LOWER('%pedagogia%').

To filter or group by age, compute it from the birth date:
  EXTRACT(YEAR FROM AGE(CURRENT_DATE, aluno_data_nascimento))

Always return at least two columns, at least one of them quantitative and suitable for charting: counts, aggregates or rates. If a single field is requested, pair it with a COUNT or an appropriate aggregate.

Return rates/percentages as decimals between 0 and 1 (e.g., 0.25 for 25%), never as text like '25%'.

Round decimal numbers to 2 places with ROUND(), e.g.:
  ROUND(column_name, 2) or ROUND(calculation, 2)

For time-based analyses, group by EXTRACT(YEAR FROM aluno_data_nascimento) or by serie as needed.

Use descriptive aliases in Brazilian Portuguese (pt-BR) for result columns, since they become chart labels. Examples:
- COUNT(*) AS "quantidade_total"
- ROUND(AVG(EXTRACT(YEAR FROM AGE(CURRENT_DATE, aluno_data_nascimento))), 2) AS "media_idade"
- raca AS "etnia"
- aluno_genero AS "genero"
"#,
            ddl = schema.to_ddl()
        )
    }

    pub async fn translate(
        &self,
        question: &NaturalLanguageQuery,
        schema: &SchemaDescription,
    ) -> Result<SqlStatement, LlmError> {
        info!("Translating question: {}", question);

        let request = GenerationRequest {
            system: self.system_prompt(schema),
            prompt: format!(
                "Generate the query necessary to retrieve the data the user wants: {}",
                question
            ),
            schema_name: "generated_query",
            schema: GeneratedQuery::json_schema(),
        };

        let generated: GeneratedQuery = generate_object(self.generator.as_ref(), &request).await?;

        // Models sometimes wrap the query in a code block even in structured mode
        let sql = strip_code_fences(&generated.query);
        if sql.is_empty() {
            return Err(LlmError::InvalidPayload("generated query is empty".to_string()));
        }

        debug!("Generated SQL: {}", sql);
        Ok(SqlStatement::new(sql))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::providers::fixture::FixtureGenerator;
    use serde_json::json;

    fn question(text: &str) -> NaturalLanguageQuery {
        NaturalLanguageQuery::new(text).unwrap()
    }

    #[tokio::test]
    async fn returns_generated_query_and_sends_schema_context() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({
            "query": "SELECT escola AS \"escola\", COUNT(*) AS \"quantidade_total\" FROM alunos GROUP BY escola"
        })]));
        let translator = QueryTranslator::new(fixture.clone());

        let sql = translator
            .translate(&question("Número de alunos por escola"), &SchemaDescription::alunos())
            .await
            .unwrap();

        assert!(sql.as_str().starts_with("SELECT escola"));

        let requests = fixture.requests();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].system.contains("aluno_data_nascimento DATE"));
        assert!(requests[0].system.contains("pt-BR"));
        assert!(requests[0].prompt.ends_with("Número de alunos por escola"));
        assert_eq!(requests[0].schema_name, "generated_query");
    }

    #[tokio::test]
    async fn strips_code_fences() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({
            "query": "```sql\nSELECT serie, COUNT(*) FROM alunos GROUP BY serie\n```"
        })]));
        let translator = QueryTranslator::new(fixture);
        let sql = translator
            .translate(&question("alunos por série"), &SchemaDescription::alunos())
            .await
            .unwrap();
        assert_eq!(sql.as_str(), "SELECT serie, COUNT(*) FROM alunos GROUP BY serie");
    }

    #[tokio::test]
    async fn empty_query_is_a_generation_error() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({ "query": "   " })]));
        let translator = QueryTranslator::new(fixture);
        let err = translator
            .translate(&question("qualquer coisa"), &SchemaDescription::alunos())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::InvalidPayload(_)));
    }

    #[tokio::test]
    async fn backend_failure_propagates() {
        let translator = QueryTranslator::new(Arc::new(FixtureGenerator::failing("offline")));
        let err = translator
            .translate(&question("qualquer coisa"), &SchemaDescription::alunos())
            .await
            .unwrap_err();
        assert!(matches!(err, LlmError::ConnectionError(_)));
    }
}
