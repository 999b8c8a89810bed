use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value as Json;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ChartSettings;
use crate::llm::models::ChartDraft;
use crate::llm::{generate_object, GenerationRequest, TextGenerator};
use crate::pipeline::error::SynthesisError;
use crate::pipeline::types::{ChartConfig, ChartType, NaturalLanguageQuery, ResultSet};

/// Most slices a pie chart may have before a bar chart reads better.
const PIE_MAX_SLICES: usize = 8;
/// Rows sent to the LLM planner as a sample of the data.
const LLM_SAMPLE_ROWS: usize = 50;

const ORDINAL_NAME_TOKENS: &[&str] = &[
    "ano", "anos", "mes", "mês", "meses", "dia", "data", "periodo", "período", "semestre",
    "trimestre", "year", "month", "day", "date", "period",
];
const RATE_NAME_TOKENS: &[&str] = &[
    "percentual", "porcentagem", "proporcao", "proporção", "taxa", "razao", "razão", "percent",
    "percentage", "pct", "rate", "ratio",
];

const SCATTER_INTENT: &[&str] = &[
    "correlação", "correlacao", "relação entre", "relacao entre", "dispersão", "dispersao",
    "correlation", "scatter",
];
const AREA_INTENT: &[&str] = &["acumulad", "cumulative", "cumulativ"];
const TREND_INTENT: &[&str] = &[
    "evolução", "evolucao", "ao longo", "tendência", "tendencia", "histórico", "historico",
    "crescimento", "por ano", "por mês", "por mes", "trend", "over time",
];
const SHARE_INTENT: &[&str] = &[
    "percentual", "porcentagem", "proporção", "proporcao", "distribuição", "distribuicao",
    "participação", "participacao", "fatia", "share", "proportion", "breakdown",
];
const RATE_INTENT: &[&str] = &[
    "percentual", "porcentagem", "proporção", "proporcao", "taxa", "percent", "%", "rate",
];

pub fn default_palette() -> Vec<String> {
    (1..=5).map(|i| format!("hsl(var(--chart-{}))", i)).collect()
}

/// Color token for the series at `index`; wraps around short palettes.
pub fn color_for(index: usize, palette: &[String]) -> &str {
    &palette[index % palette.len()]
}

pub fn assign_colors(y_keys: &[String], palette: &[String]) -> BTreeMap<String, String> {
    y_keys
        .iter()
        .enumerate()
        .map(|(i, key)| (key.clone(), color_for(i, palette).to_string()))
        .collect()
}

#[async_trait]
pub trait ChartPlanner: Send + Sync {
    fn name(&self) -> &'static str;

    async fn plan(
        &self,
        question: &NaturalLanguageQuery,
        results: &ResultSet,
    ) -> Result<ChartDraft, SynthesisError>;
}

pub struct ChartConfigSynthesizer {
    planner: Box<dyn ChartPlanner>,
    palette: Vec<String>,
}

impl ChartConfigSynthesizer {
    pub fn new(planner: Box<dyn ChartPlanner>, palette: Vec<String>) -> Self {
        let palette = if palette.is_empty() { default_palette() } else { palette };
        Self { planner, palette }
    }

    pub fn heuristic(palette: Vec<String>) -> Self {
        Self::new(Box::new(HeuristicPlanner), palette)
    }

    /// Picks the planner named in `settings`; unknown names get the heuristic.
    pub fn from_settings(settings: &ChartSettings, generator: Arc<dyn TextGenerator>) -> Self {
        let palette = settings.palette.clone();
        match settings.planner.as_str() {
            "llm" => Self::new(Box::new(LlmChartPlanner::new(generator)), palette),
            "heuristic" => Self::heuristic(palette),
            other => {
                warn!("Unknown chart planner '{}', using heuristic", other);
                Self::heuristic(palette)
            }
        }
    }

    /// Name of the planner actually in use.
    pub fn planner_name(&self) -> &'static str {
        self.planner.name()
    }

    pub async fn synthesize(
        &self,
        question: &NaturalLanguageQuery,
        results: &ResultSet,
    ) -> Result<ChartConfig, SynthesisError> {
        ensure_plottable(results)?;

        let draft = self.planner.plan(question, results).await?;
        debug!("Chart draft: {:?}", draft);
        let draft = reconcile(draft, results)?;

        info!(
            "Chart synthesized: {:?} x={} y={:?}",
            draft.chart_type, draft.x_key, draft.y_keys
        );

        Ok(ChartConfig {
            colors: assign_colors(&draft.y_keys, &self.palette),
            chart_type: draft.chart_type,
            x_key: draft.x_key,
            y_keys: draft.y_keys,
            legend: draft.legend,
        })
    }
}

fn ensure_plottable(results: &ResultSet) -> Result<(), SynthesisError> {
    if results.columns.is_empty() {
        return Err(SynthesisError::NoColumns);
    }
    if results.rows.is_empty() {
        return Err(SynthesisError::NoRows);
    }
    if results.columns.len() < 2 {
        return Err(SynthesisError::TooFewColumns(results.columns.len()));
    }
    if !results.columns.iter().any(|c| is_numeric(results, c)) {
        return Err(SynthesisError::NoQuantitativeColumn);
    }
    Ok(())
}

/// Holds a draft to the result set: keys must exist, series must be numeric,
/// duplicates collapse to their first occurrence and the x axis is never a series.
fn reconcile(draft: ChartDraft, results: &ResultSet) -> Result<ChartDraft, SynthesisError> {
    if !results.has_column(&draft.x_key) {
        return Err(SynthesisError::UnknownColumn(draft.x_key));
    }

    let mut y_keys: Vec<String> = Vec::with_capacity(draft.y_keys.len());
    for key in draft.y_keys {
        if !results.has_column(&key) {
            return Err(SynthesisError::UnknownColumn(key));
        }
        if key == draft.x_key || y_keys.contains(&key) {
            continue;
        }
        if !is_numeric(results, &key) {
            return Err(SynthesisError::NonNumericSeries(key));
        }
        y_keys.push(key);
    }

    if y_keys.is_empty() {
        return Err(SynthesisError::NoSeries);
    }

    Ok(ChartDraft { y_keys, ..draft })
}

fn is_numeric(results: &ResultSet, column: &str) -> bool {
    let mut values = results.values(column).peekable();
    values.peek().is_some() && values.all(Json::is_number)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Numeric,
    Temporal,
    Categorical,
}

#[derive(Debug)]
struct ColumnProfile<'a> {
    name: &'a str,
    kind: ColumnKind,
    /// Every non-null value is a number, whatever the kind.
    numeric: bool,
    /// Every value lies in [0, 1] and the column reads as a rate.
    proportion: bool,
}

fn name_tokens(name: &str) -> Vec<String> {
    name.to_lowercase()
        .split(|c: char| c == '_' || c == ' ' || c == '-')
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn name_has_any(name: &str, vocabulary: &[&str]) -> bool {
    name_tokens(name).iter().any(|t| vocabulary.contains(&t.as_str()))
}

fn looks_like_date(value: &Json) -> bool {
    value
        .as_str()
        .and_then(|s| s.get(..10))
        .is_some_and(|prefix| NaiveDate::parse_from_str(prefix, "%Y-%m-%d").is_ok())
}

fn profile<'a>(results: &ResultSet, name: &'a str) -> ColumnProfile<'a> {
    let ordinal_name = name_has_any(name, ORDINAL_NAME_TOKENS);

    if is_numeric(results, name) {
        let numbers: Vec<f64> = results.values(name).filter_map(Json::as_f64).collect();
        let in_unit_range = numbers.iter().all(|v| (0.0..=1.0).contains(v));
        let fractional = numbers.iter().any(|v| v.fract() != 0.0);
        let proportion = in_unit_range && (fractional || name_has_any(name, RATE_NAME_TOKENS));
        let kind = if ordinal_name { ColumnKind::Temporal } else { ColumnKind::Numeric };
        return ColumnProfile { name, kind, numeric: true, proportion };
    }

    let mut values = results.values(name).peekable();
    let temporal = ordinal_name || (values.peek().is_some() && values.all(looks_like_date));
    let kind = if temporal { ColumnKind::Temporal } else { ColumnKind::Categorical };
    ColumnProfile { name, kind, numeric: false, proportion: false }
}

/// A number with an ordinal name (`ano`, `media_idade_anos`) is only an axis
/// while another number is left to plot. With no plain measure, the first of
/// several such columns stays the axis and the rest become series; a lone one
/// becomes the series.
fn keep_a_measure(profiles: &mut [ColumnProfile]) {
    if profiles.iter().any(|p| p.kind == ColumnKind::Numeric) {
        return;
    }
    let ordinal: Vec<usize> = profiles
        .iter()
        .enumerate()
        .filter(|(_, p)| p.numeric && p.kind == ColumnKind::Temporal)
        .map(|(i, _)| i)
        .collect();
    let axis = if ordinal.len() >= 2 { ordinal.first().copied() } else { None };
    for i in ordinal {
        if Some(i) != axis {
            profiles[i].kind = ColumnKind::Numeric;
        }
    }
}

fn mentions(question: &str, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|w| question.contains(w))
}

/// Deterministic planner driven by column profiles and intent keywords in
/// the question (pt-BR and English).
pub struct HeuristicPlanner;

impl HeuristicPlanner {
    pub fn draft(question: &NaturalLanguageQuery, results: &ResultSet) -> Result<ChartDraft, SynthesisError> {
        let mut profiles: Vec<ColumnProfile> = results.columns.iter().map(|c| profile(results, c)).collect();
        if profiles.is_empty() {
            return Err(SynthesisError::NoColumns);
        }
        keep_a_measure(&mut profiles);
        let question = question.as_str().to_lowercase();

        let x = profiles
            .iter()
            .find(|p| p.kind == ColumnKind::Temporal)
            .or_else(|| profiles.iter().find(|p| p.kind == ColumnKind::Categorical))
            .unwrap_or(&profiles[0]);

        let mut series: Vec<&ColumnProfile> = profiles
            .iter()
            .filter(|p| p.kind == ColumnKind::Numeric && p.name != x.name)
            .collect();

        // A rate next to the counts it was derived from is the same measure on
        // another scale; plot whichever the question asks for.
        let has_rates = series.iter().any(|p| p.proportion);
        let has_absolutes = series.iter().any(|p| !p.proportion);
        if has_rates && has_absolutes {
            let want_rates = mentions(&question, RATE_INTENT);
            series.retain(|p| p.proportion == want_rates);
        }

        if series.is_empty() {
            return Err(SynthesisError::NoQuantitativeColumn);
        }

        let x_numeric = x.kind == ColumnKind::Numeric;
        let x_temporal = x.kind == ColumnKind::Temporal;
        let single_series = series.len() == 1;
        let non_negative = series
            .iter()
            .all(|p| results.values(p.name).filter_map(Json::as_f64).all(|v| v >= 0.0));
        let pie_fits = single_series && !x_temporal && non_negative && results.rows.len() <= PIE_MAX_SLICES;

        let chart_type = if mentions(&question, SCATTER_INTENT) && x_numeric {
            ChartType::Scatter
        } else if mentions(&question, AREA_INTENT) && x_temporal {
            ChartType::Area
        } else if mentions(&question, TREND_INTENT) {
            ChartType::Line
        } else if mentions(&question, SHARE_INTENT) && pie_fits {
            ChartType::Pie
        } else if x_temporal {
            ChartType::Line
        } else if x_numeric {
            ChartType::Scatter
        } else {
            ChartType::Bar
        };

        Ok(ChartDraft {
            chart_type,
            x_key: x.name.to_string(),
            y_keys: series.iter().map(|p| p.name.to_string()).collect(),
            legend: !single_series || chart_type == ChartType::Pie,
        })
    }
}

#[async_trait]
impl ChartPlanner for HeuristicPlanner {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    async fn plan(
        &self,
        question: &NaturalLanguageQuery,
        results: &ResultSet,
    ) -> Result<ChartDraft, SynthesisError> {
        Self::draft(question, results)
    }
}

/// Asks the text-generation capability for the draft.
pub struct LlmChartPlanner {
    generator: Arc<dyn TextGenerator>,
}

impl LlmChartPlanner {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl ChartPlanner for LlmChartPlanner {
    fn name(&self) -> &'static str {
        "llm"
    }

    async fn plan(
        &self,
        question: &NaturalLanguageQuery,
        results: &ResultSet,
    ) -> Result<ChartDraft, SynthesisError> {
        let sample: Vec<_> = results.rows.iter().take(LLM_SAMPLE_ROWS).collect();
        let data = serde_json::to_string_pretty(&sample).unwrap_or_else(|_| "[]".to_string());

        let request = GenerationRequest {
            system: "You are a data visualization expert. Your job is to generate chart configurations that best visualize the data. All labels, titles and descriptions must be in Brazilian Portuguese (pt-BR).".to_string(),
            prompt: format!(
                r#"Given the following data from a SQL query result, generate the chart config that best visualises the data and answers the user's query.
For multiple groups use multi-lines. Use only these column names: {columns}.
Allowed types: bar, line, pie, area, scatter.

Here is an example complete config:
{{ "type": "pie", "xKey": "month", "yKeys": ["sales", "profit", "expenses"], "legend": true }}

User Query:
{question}

Data:
{data}"#,
                columns = results.columns.join(", "),
                question = question,
                data = data
            ),
            schema_name: "chart_config",
            schema: ChartDraft::json_schema(),
        };

        generate_object(self.generator.as_ref(), &request)
            .await
            .map_err(SynthesisError::Planner)
    }
}
