//! Router construction

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn router(state: Arc<AppState>, body_limit: usize) -> Router {
    // CORS configuration for web clients
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health))
        // Documents
        .route(
            "/api/documents",
            get(handlers::list_documents).post(handlers::create_document),
        )
        .route(
            "/api/documents/:id",
            get(handlers::get_document)
                .patch(handlers::update_document)
                .delete(handlers::delete_document),
        )
        // Elements
        .route("/api/documents/:id/text", post(handlers::add_text))
        .route("/api/documents/:id/signature", post(handlers::add_signature))
        .route(
            "/api/documents/:id/elements",
            get(handlers::list_elements)
                .post(handlers::add_elements)
                .put(handlers::replace_elements),
        )
        .route(
            "/api/documents/:id/elements/:element_id",
            delete(handlers::delete_element),
        )
        // Output
        .route("/api/documents/:id/download", get(handlers::download_document))
        .route("/api/documents/:id/stream", get(handlers::stream_document))
        // Signature previews
        .route("/api/signatures/preview", post(handlers::preview_signature))
        // Add middleware
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
