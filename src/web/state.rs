use crate::config::AppConfig;
use crate::db::favorites::FavoritesStore;
use crate::pipeline::NlPipeline;

/// Shared application state for the web server
pub struct AppState {
    pub config: AppConfig,
    pub pipeline: NlPipeline,
    pub favorites: FavoritesStore,
    /// Name of the text-generation backend in use.
    pub backend: String,
    pub startup_time: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(config: AppConfig, pipeline: NlPipeline, favorites: FavoritesStore, backend: String) -> Self {
        Self {
            config,
            pipeline,
            favorites,
            backend,
            startup_time: chrono::Utc::now(),
        }
    }
}
