use axum::{Router, http::Method};
use tower_http::cors::{Any, CorsLayer};

use crate::state::SharedState;

pub mod api;
pub mod buttons;
pub mod docs;
pub mod events;
pub mod health;

/// CORS policy for the polled endpoints: any origin, the verbs the control
/// surfaces use, and JSON bodies. Kept permissive on purpose, the documents
/// served here are public to every surface in the session.
fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(api::router())
        .merge(buttons::router())
        .merge(events::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).layer(cors()).with_state(state)
}
