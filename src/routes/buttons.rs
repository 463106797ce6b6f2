//! Operator-facing button management routes.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use axum_valid::Valid;
use serde_json::Value;

use crate::{
    dto::{
        buttons::{ActionResponse, AddButtonRequest, ButtonView, ButtonsResponse},
        snapshot::Snapshot,
    },
    error::AppError,
    services::sync_engine,
    state::{SharedState, event_log::LogEntry},
};

/// Routes handling button management and configuration.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/buttons", get(list_buttons).post(add_button))
        .route(
            "/buttons/{id}",
            axum::routing::delete(delete_button),
        )
        .route("/buttons/{id}/activate", post(activate_button))
        .route("/config/export", get(export_config))
        .route("/config/import", post(import_config))
        .route("/config/reset", post(reset_config))
        .route("/log", get(event_log))
}

#[utoipa::path(
    get,
    path = "/buttons",
    tag = "buttons",
    responses((status = 200, description = "All buttons with live state", body = ButtonsResponse))
)]
/// List all registered buttons joined with their live press states.
pub async fn list_buttons(State(state): State<SharedState>) -> Json<ButtonsResponse> {
    let control = state.control().read().await;
    let buttons = control
        .registry
        .iter()
        .map(|definition| ButtonView::from_parts(definition, control.store.get(&definition.id)))
        .collect();
    Json(ButtonsResponse {
        connected: state.is_connected(),
        buttons,
    })
}

#[utoipa::path(
    post,
    path = "/buttons",
    tag = "buttons",
    request_body = AddButtonRequest,
    responses(
        (status = 200, description = "Button registered", body = ButtonView),
        (status = 400, description = "Empty label or duplicate identifier")
    )
)]
/// Register a new button, deriving its identifier from the label.
pub async fn add_button(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<AddButtonRequest>>,
) -> Result<Json<ButtonView>, AppError> {
    let view = sync_engine::add_button(&state, payload).await?;
    Ok(Json(view))
}

#[utoipa::path(
    delete,
    path = "/buttons/{id}",
    tag = "buttons",
    params(("id" = String, Path, description = "Button identifier")),
    responses((status = 200, description = "Removal outcome", body = ActionResponse))
)]
/// Remove a button. Removing an unknown identifier is a no-op.
pub async fn delete_button(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Json<ActionResponse> {
    let message = match sync_engine::remove_button(&state, &id).await {
        Some(definition) => format!("removed {}", definition.label),
        None => format!("no button `{id}` to remove"),
    };
    Json(ActionResponse::new(message))
}

#[utoipa::path(
    post,
    path = "/buttons/{id}/activate",
    tag = "buttons",
    params(("id" = String, Path, description = "Button identifier")),
    responses(
        (status = 200, description = "Button pressed", body = ButtonView),
        (status = 404, description = "Unknown button")
    )
)]
/// Press a button, starting (or restarting) its pulse window.
pub async fn activate_button(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<ButtonView>, AppError> {
    let view = sync_engine::activate(&state, &id).await?;
    Ok(Json(view))
}

#[utoipa::path(
    get,
    path = "/config/export",
    tag = "buttons",
    responses((status = 200, description = "Exported configuration", body = Snapshot))
)]
/// Export the full button configuration and state.
pub async fn export_config(State(state): State<SharedState>) -> Json<Snapshot> {
    Json(sync_engine::export(&state).await)
}

#[utoipa::path(
    post,
    path = "/config/import",
    tag = "buttons",
    request_body = Value,
    responses(
        (status = 200, description = "Configuration imported", body = ActionResponse),
        (status = 400, description = "Document is missing a valid buttons map")
    )
)]
/// Replace the button configuration wholesale from an exported document.
pub async fn import_config(
    State(state): State<SharedState>,
    Json(payload): Json<Value>,
) -> Result<Json<ActionResponse>, AppError> {
    let count = sync_engine::import(&state, payload).await?;
    Ok(Json(ActionResponse::new(format!(
        "imported {count} button(s)"
    ))))
}

#[utoipa::path(
    post,
    path = "/config/reset",
    tag = "buttons",
    responses((status = 200, description = "Defaults restored", body = ActionResponse))
)]
/// Discard the stored configuration and reseed the defaults.
pub async fn reset_config(State(state): State<SharedState>) -> Json<ActionResponse> {
    sync_engine::reset(&state).await;
    Json(ActionResponse::new("configuration reset"))
}

#[utoipa::path(
    get,
    path = "/log",
    tag = "buttons",
    responses((status = 200, description = "Recent events, most recent first", body = [LogEntry]))
)]
/// Recent operator-visible events.
pub async fn event_log(State(state): State<SharedState>) -> Json<Vec<LogEntry>> {
    Json(state.log_entries().await)
}
