//! Natural-language-to-chart pipeline.
//!
//! question → [`translator`] → SQL → [`safety`] gate → [`executor`] → rows →
//! [`chart`] config, with [`explainer`] available on demand for the same
//! (question, SQL) pair.

pub mod chart;
pub mod error;
pub mod executor;
pub mod explainer;
pub mod safety;
pub mod schema;
#[cfg(test)]
pub mod test_support;
pub mod translator;
pub mod types;

use serde::Serialize;
use std::sync::Arc;
use tracing::info;

use chart::ChartConfigSynthesizer;
use error::PipelineError;
use executor::QueryExecutor;
use explainer::QueryExplainer;
use safety::{ExecutableStatement, QuerySafetyGate};
use schema::SchemaDescription;
use translator::QueryTranslator;
use types::{ChartConfig, Explanation, NaturalLanguageQuery, ResultSet, SqlStatement};

/// Everything produced for one question.
#[derive(Debug, Serialize)]
pub struct PipelineAnswer {
    pub question: String,
    pub sql: ExecutableStatement,
    pub result: ResultSet,
    pub chart: ChartConfig,
}

pub struct NlPipeline {
    schema: Arc<SchemaDescription>,
    translator: QueryTranslator,
    gate: QuerySafetyGate,
    executor: QueryExecutor,
    synthesizer: ChartConfigSynthesizer,
    explainer: QueryExplainer,
}

impl NlPipeline {
    pub fn new(
        schema: Arc<SchemaDescription>,
        translator: QueryTranslator,
        executor: QueryExecutor,
        synthesizer: ChartConfigSynthesizer,
        explainer: QueryExplainer,
    ) -> Self {
        Self {
            schema,
            translator,
            gate: QuerySafetyGate::new(),
            executor,
            synthesizer,
            explainer,
        }
    }

    pub fn schema(&self) -> &SchemaDescription {
        &self.schema
    }

    pub fn planner_name(&self) -> &'static str {
        self.synthesizer.planner_name()
    }

    pub async fn translate(&self, question: &NaturalLanguageQuery) -> Result<SqlStatement, PipelineError> {
        Ok(self.translator.translate(question, &self.schema).await?)
    }

    pub fn validate(&self, candidate: &SqlStatement) -> Result<ExecutableStatement, PipelineError> {
        Ok(self.gate.validate(candidate)?)
    }

    /// Gate then execute; unvalidated text never reaches the store.
    pub async fn execute(&self, candidate: &SqlStatement) -> Result<ResultSet, PipelineError> {
        let stmt = self.validate(candidate)?;
        Ok(self.executor.execute(&stmt).await?)
    }

    pub async fn synthesize(
        &self,
        question: &NaturalLanguageQuery,
        results: &ResultSet,
    ) -> Result<ChartConfig, PipelineError> {
        Ok(self.synthesizer.synthesize(question, results).await?)
    }

    pub async fn explain(
        &self,
        question: &NaturalLanguageQuery,
        candidate: &SqlStatement,
    ) -> Result<Explanation, PipelineError> {
        let stmt = self.validate(candidate)?;
        Ok(self.explainer.explain(question, &stmt).await?)
    }

    /// translate → validate → execute → synthesize.
    pub async fn answer(&self, question: &NaturalLanguageQuery) -> Result<PipelineAnswer, PipelineError> {
        let candidate = self.translate(question).await?;
        let sql = self.validate(&candidate)?;
        let result = self.executor.execute(&sql).await?;
        let chart = self.synthesizer.synthesize(question, &result).await?;

        info!(
            "Answered '{}' with {} rows as a {:?} chart",
            question,
            result.rows.len(),
            chart.chart_type
        );

        Ok(PipelineAnswer {
            question: question.to_string(),
            sql,
            result,
            chart,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::db_pool::memory_pool;
    use crate::llm::providers::fixture::FixtureGenerator;
    use crate::pipeline::chart::default_palette;
    use crate::pipeline::error::{ExecutionError, SafetyError};
    use crate::pipeline::test_support::seeded_pool;
    use crate::pipeline::types::ChartType;
    use serde_json::json;

    fn pipeline(fixture: Arc<FixtureGenerator>, pool: r2d2::Pool<crate::db::db_pool::DuckDBConnectionManager>) -> NlPipeline {
        let schema = Arc::new(SchemaDescription::alunos());
        NlPipeline::new(
            schema.clone(),
            QueryTranslator::new(fixture.clone()),
            QueryExecutor::new(pool),
            ChartConfigSynthesizer::heuristic(default_palette()),
            QueryExplainer::new(fixture, schema),
        )
    }

    fn question(text: &str) -> NaturalLanguageQuery {
        NaturalLanguageQuery::new(text).unwrap()
    }

    #[tokio::test]
    async fn answers_students_per_school() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({
            "query": "SELECT escola AS \"escola\", COUNT(*) AS \"quantidade_total\" FROM alunos GROUP BY escola ORDER BY escola"
        })]));
        let answer = pipeline(fixture, seeded_pool())
            .answer(&question("Número de alunos por escola"))
            .await
            .unwrap();

        assert_eq!(answer.result.rows.len(), 2);
        assert_eq!(answer.result.rows[0]["quantidade_total"], json!(2));
        assert_eq!(answer.chart.chart_type, ChartType::Bar);
        assert_eq!(answer.chart.x_key, "escola");
        assert_eq!(answer.chart.y_keys, vec!["quantidade_total"]);
        assert!(!answer.chart.legend);
    }

    #[tokio::test]
    async fn unsafe_translation_never_executes() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({
            "query": "SELECT * FROM alunos; DROP TABLE alunos;"
        })]));
        let pool = seeded_pool();
        let err = pipeline(fixture, pool.clone())
            .answer(&question("apague tudo"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Safety(_)));

        // Table still there
        let count: i64 = pool
            .get()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM alunos", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
    }

    #[tokio::test]
    async fn missing_table_surfaces_as_schema_missing() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({
            "query": "SELECT escola, COUNT(*) AS total FROM alunos GROUP BY escola"
        })]));
        let err = pipeline(fixture, memory_pool())
            .answer(&question("alunos por escola"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Execution(ExecutionError::SchemaMissing { .. })
        ));
    }

    #[tokio::test]
    async fn empty_result_fails_synthesis() {
        let fixture = Arc::new(FixtureGenerator::new(vec![json!({
            "query": "SELECT escola, COUNT(*) AS total FROM alunos WHERE cidade = 'Nenhuma' GROUP BY escola"
        })]));
        let err = pipeline(fixture, seeded_pool())
            .answer(&question("alunos em cidade nenhuma"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Synthesis(_)));
    }

    #[tokio::test]
    async fn explain_gates_before_generating() {
        let fixture = Arc::new(FixtureGenerator::new(vec![]));
        let p = pipeline(fixture.clone(), memory_pool());
        let err = p
            .explain(&question("q"), &SqlStatement::new("DELETE FROM alunos"))
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Safety(SafetyError::NotASelect(_))));
        assert!(fixture.requests().is_empty());
    }

    #[test]
    fn blank_question_is_rejected() {
        assert!(matches!(
            NaturalLanguageQuery::new("  \t "),
            Err(PipelineError::InvalidQuestion(_))
        ));
    }
}
