//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

use super::handlers;
use super::state::AppState;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_request(DefaultOnRequest::new().level(Level::DEBUG))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    // Endpoints used by tests acting as the chat user
    let client_routes = Router::new()
        .route("/sendMessage", post(handlers::client::send_message))
        .route("/sendCommand", post(handlers::client::send_message))
        .route("/sendCallback", post(handlers::client::send_callback))
        .route("/getUpdates", post(handlers::client::get_updates))
        .route(
            "/getUpdatesHistory",
            post(handlers::client::get_updates_history),
        );

    // Bot API: `/bot<token>/<method>`, the `bot` prefix is checked by the handler
    let bot_routes = Router::new().route(
        "/{bot_token}/{method}",
        get(handlers::bot::dispatch).post(handlers::bot::dispatch),
    );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(client_routes)
        .merge(bot_routes)
        .layer(cors)
        .layer(trace_layer)
        .with_state(state)
}
