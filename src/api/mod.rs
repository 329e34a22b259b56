// HTTP adapter over the conductor

pub mod errors;
pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::agents::Conductor;
use handlers::{agents, health};

/// Build the application router.
///
/// Middleware layers (tracing, CORS) are added by the binary.
pub fn router(conductor: Conductor) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Agent routes
        .route("/api/agents", get(agents::dashboard).post(agents::spawn_agent))
        .route("/api/agents/:id", get(agents::get_agent).delete(agents::retire_agent))
        .route("/api/agents/:id/tasks", post(agents::submit_task))
        .route("/api/agents/:id/handoff", post(agents::request_handoff))
        // Activity log
        .route("/api/events", get(agents::activity))
        .with_state(conductor)
}
