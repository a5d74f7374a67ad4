// API layer module (adapters for controllers)
// Thin HTTP surface over the dispatch engine

pub mod errors;
pub mod handlers;

use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use handlers::{agents, tasks};

/// Shared handler state
pub type AppState = Arc<Dispatcher>;

/// Build the application router
pub fn router(dispatcher: AppState) -> Router {
    // Configure CORS
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Agent routes
        .route(
            "/api/v1/agents",
            post(agents::register_agent).get(agents::list_agents),
        )
        .route("/api/v1/agents/:id", get(agents::get_agent))
        .route("/api/v1/agents/:id/status", put(agents::update_agent_status))
        // Task routes
        .route(
            "/api/v1/tasks",
            post(tasks::create_task).get(tasks::list_tasks),
        )
        .route("/api/v1/tasks/:id", get(tasks::get_task))
        .route("/api/v1/tasks/:id/assign", post(tasks::assign_task))
        .route("/api/v1/tasks/:id/status", get(tasks::task_status))
        .route("/api/v1/tasks/:id/events", get(tasks::task_events))
        .route(
            "/api/v1/tasks/:id/subtasks/:subtask_id/status",
            put(tasks::update_subtask_status),
        )
        .route(
            "/api/v1/tasks/:id/subtasks/:subtask_id/result",
            post(tasks::report_result),
        )
        // Event routes
        .route("/api/v1/events", get(tasks::recent_events))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Shared state
        .with_state(dispatcher)
}
