use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers;
use super::state::AppState;

// API Routes - REST API for programmatic access
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .nest(
            "/api",
            Router::new()
                // Pipeline stages
                .route("/translate", post(handlers::api::translate))
                .route("/execute", post(handlers::api::execute))
                .route("/explain", post(handlers::api::explain))
                .route("/chart", post(handlers::api::chart))
                .route("/nl-query", post(handlers::api::nl_query))

                // Saved questions
                .route(
                    "/favorites",
                    get(handlers::api::list_favorites)
                        .post(handlers::api::add_favorite)
                        .delete(handlers::api::remove_favorite),
                )
                .route("/favorites/check", get(handlers::api::check_favorite))

                // Schema and system status
                .route("/schema", get(handlers::api::get_schema))
                .route("/status", get(handlers::api::system_status))
        )
}
