use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod db;
mod llm;
mod pipeline;
mod util;
mod web;

use crate::config::{AppConfig, CliArgs};
use crate::db::db_pool::build_pool;
use crate::db::favorites::FavoritesStore;
use crate::llm::{LlmManager, TextGenerator};
use crate::pipeline::chart::ChartConfigSynthesizer;
use crate::pipeline::executor::QueryExecutor;
use crate::pipeline::explainer::QueryExplainer;
use crate::pipeline::schema::SchemaDescription;
use crate::pipeline::translator::QueryTranslator;
use crate::pipeline::NlPipeline;
use crate::util::logging::init_tracing;
use crate::web::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args = CliArgs::parse();

    // Initialize logging
    init_tracing(args.log_json);

    // Load configuration
    let config = match AppConfig::new(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    info!(
        "Opening student records at {} (read-only: {})",
        config.database.connection_string, config.database.read_only
    );
    let records_pool = build_pool(
        &config.database.connection_string,
        config.database.pool_size as u32,
        config.database.read_only,
    )?;

    info!("Opening favorites at {}", config.favorites.connection_string);
    let favorites_pool = build_pool(&config.favorites.connection_string, 1, false)?;
    let favorites = FavoritesStore::new(favorites_pool);
    favorites.ensure_schema(config.favorites.seed_defaults).await?;

    // Initialize LLM manager
    info!("Initializing LLM manager with backend: {}", config.llm.backend);
    let llm_manager = LlmManager::new(&config.llm)?;
    let backend = llm_manager.backend().to_string();
    let generator: Arc<dyn TextGenerator> = Arc::new(llm_manager);

    let synthesizer = ChartConfigSynthesizer::from_settings(&config.chart, generator.clone());
    info!("Chart planner: {}", synthesizer.planner_name());

    let schema = Arc::new(SchemaDescription::alunos());
    let pipeline = NlPipeline::new(
        schema.clone(),
        QueryTranslator::new(generator.clone()),
        QueryExecutor::new(records_pool),
        synthesizer,
        QueryExplainer::new(generator, schema),
    );

    let app_state = Arc::new(AppState::new(config.clone(), pipeline, favorites, backend));

    // Start the web server
    info!("Starting NL-Chart server on {}:{}", config.web.host, config.web.port);
    match web::run_server(config.web, app_state).await {
        Ok(_) => info!("Server stopped gracefully"),
        Err(e) => {
            error!("Server error: {}", e);
            return Err(e.into());
        }
    }

    Ok(())
}
