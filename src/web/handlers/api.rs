use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::db::favorites::FavoritesError;
use crate::pipeline::error::{ExecutionError, PipelineError, SynthesisError};
use crate::pipeline::types::{
    ChartConfig, Explanation, NaturalLanguageQuery, ResultRow, ResultSet, SqlStatement,
};
use crate::pipeline::PipelineAnswer;
use crate::web::state::AppState;

type ApiError = (StatusCode, String);

// Pipeline types

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct TranslateResponse {
    pub query: SqlStatement,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct ExplainRequest {
    pub question: String,
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct ExplainResponse {
    pub explanations: Explanation,
}

#[derive(Debug, Deserialize)]
pub struct ChartRequest {
    pub question: String,
    pub results: Vec<ResultRow>,
}

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub config: ChartConfig,
}

// Favorite types

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct FavoritesResponse {
    pub favorites: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteCheckResponse {
    pub favorite: bool,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

// Schema and system status

#[derive(Debug, Serialize)]
pub struct SchemaResponse {
    pub table: String,
    pub columns: Vec<String>,
    pub ddl: String,
}

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: String,
    pub uptime_seconds: i64,
    pub backend: String,
    pub planner: String,
}

/// Maps pipeline failures onto status codes. `generation_message` is the
/// client-facing text for a failed text-generation call.
fn pipeline_error(err: PipelineError, generation_message: &str) -> ApiError {
    match err {
        PipelineError::InvalidQuestion(msg) => {
            debug!("Rejected question: {}", msg);
            (StatusCode::BAD_REQUEST, format!("Invalid question: {}", msg))
        }
        PipelineError::InconsistentRows { row } => {
            debug!("Rejected chart rows: row {} differs from the first", row);
            (StatusCode::BAD_REQUEST, format!("All rows must share the same columns (row {} differs)", row))
        }
        PipelineError::Generation(e) => {
            error!("Text generation failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, generation_message.to_string())
        }
        PipelineError::Safety(e) => {
            warn!("Unsafe statement rejected: {}", e);
            (StatusCode::BAD_REQUEST, "Only SELECT queries are allowed".to_string())
        }
        PipelineError::Execution(ExecutionError::SchemaMissing { relation }) => {
            warn!("Query referenced missing relation '{}'", relation);
            (StatusCode::NOT_FOUND, "Table does not exist".to_string())
        }
        PipelineError::Execution(e) => {
            error!("Query execution failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Database query failed: {}", e))
        }
        PipelineError::Synthesis(SynthesisError::Planner(e)) => {
            error!("Chart planner failed: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate chart suggestion".to_string())
        }
        PipelineError::Synthesis(e) => {
            warn!("Result set cannot be charted: {}", e);
            (StatusCode::UNPROCESSABLE_ENTITY, "Failed to generate chart suggestion".to_string())
        }
    }
}

fn favorites_error(err: FavoritesError) -> ApiError {
    match err {
        FavoritesError::InvalidQuery => (StatusCode::BAD_REQUEST, "Invalid query".to_string()),
        other => {
            error!("Favorites store failed: {}", other);
            (StatusCode::INTERNAL_SERVER_ERROR, "Favorites store error".to_string())
        }
    }
}

fn question(text: String) -> Result<NaturalLanguageQuery, ApiError> {
    NaturalLanguageQuery::new(text).map_err(|e| pipeline_error(e, "Failed to generate query"))
}

// API Implementations

pub async fn translate(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<TranslateResponse>, ApiError> {
    let question = question(payload.question)?;
    debug!("Translating: {}", question);

    let query = app_state
        .pipeline
        .translate(&question)
        .await
        .map_err(|e| pipeline_error(e, "Failed to generate query"))?;

    Ok(Json(TranslateResponse { query }))
}

pub async fn execute(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ExecuteRequest>,
) -> Result<Json<ResultSet>, ApiError> {
    let candidate = SqlStatement::new(payload.query);

    let result = app_state
        .pipeline
        .execute(&candidate)
        .await
        .map_err(|e| pipeline_error(e, "Failed to generate query"))?;

    Ok(Json(result))
}

pub async fn explain(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ExplainRequest>,
) -> Result<Json<ExplainResponse>, ApiError> {
    let question = question(payload.question)?;
    let candidate = SqlStatement::new(payload.query);

    let explanations = app_state
        .pipeline
        .explain(&question, &candidate)
        .await
        .map_err(|e| pipeline_error(e, "Failed to generate explanation"))?;

    Ok(Json(ExplainResponse { explanations }))
}

pub async fn chart(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<ChartRequest>,
) -> Result<Json<ChartResponse>, ApiError> {
    let question = question(payload.question)?;
    let results = ResultSet::from_rows(payload.results)
        .map_err(|e| pipeline_error(e, "Failed to generate chart suggestion"))?;

    let config = app_state
        .pipeline
        .synthesize(&question, &results)
        .await
        .map_err(|e| pipeline_error(e, "Failed to generate chart suggestion"))?;

    Ok(Json(ChartResponse { config }))
}

pub async fn nl_query(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<QuestionRequest>,
) -> Result<Json<PipelineAnswer>, ApiError> {
    let question = question(payload.question)?;
    info!("NL-query: {}", question);

    let answer = app_state
        .pipeline
        .answer(&question)
        .await
        .map_err(|e| pipeline_error(e, "Failed to generate query"))?;

    Ok(Json(answer))
}

pub async fn list_favorites(
    State(app_state): State<Arc<AppState>>,
) -> Result<Json<FavoritesResponse>, ApiError> {
    let favorites = app_state.favorites.list().await.map_err(favorites_error)?;
    Ok(Json(FavoritesResponse { favorites }))
}

pub async fn add_favorite(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<FavoriteRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    app_state.favorites.add(&payload.query).await.map_err(favorites_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn remove_favorite(
    State(app_state): State<Arc<AppState>>,
    Json(payload): Json<FavoriteRequest>,
) -> Result<Json<SuccessResponse>, ApiError> {
    app_state.favorites.remove(&payload.query).await.map_err(favorites_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn check_favorite(
    State(app_state): State<Arc<AppState>>,
    Query(params): Query<FavoriteRequest>,
) -> Result<Json<FavoriteCheckResponse>, ApiError> {
    let favorite = app_state.favorites.contains(&params.query).await.map_err(favorites_error)?;
    Ok(Json(FavoriteCheckResponse { favorite }))
}

pub async fn get_schema(State(app_state): State<Arc<AppState>>) -> Json<SchemaResponse> {
    let schema = app_state.pipeline.schema();
    Json(SchemaResponse {
        table: schema.table.clone(),
        columns: schema.column_names().map(str::to_string).collect(),
        ddl: schema.to_ddl(),
    })
}

pub async fn system_status(State(app_state): State<Arc<AppState>>) -> Json<SystemStatus> {
    let now = chrono::Utc::now();
    let uptime = now.signed_duration_since(app_state.startup_time).num_seconds();

    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: uptime,
        backend: app_state.backend.clone(),
        planner: app_state.pipeline.planner_name().to_string(),
    })
}
