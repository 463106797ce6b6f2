//! Poller-facing routes. These serve the exact documents the GSI companion
//! and peer control surfaces poll, so their shapes are wire-frozen.

use axum::{Json, Router, extract::State, routing::get};
use axum_valid::Valid;

use crate::{
    dao::models::GlobalDocument,
    dto::{
        buttons::ActionResponse,
        command::{CommandAck, CommandSubmission},
        snapshot::Snapshot,
    },
    error::{AppError, ServiceError},
    services::{command_relay, sync_engine},
    state::SharedState,
};

#[utoipa::path(
    get,
    path = "/api/global.json",
    tag = "poller",
    responses((status = 200, description = "Shared command document", body = GlobalDocument))
)]
/// Serve the shared command document the companion polls.
pub async fn global_document(
    State(state): State<SharedState>,
) -> Result<Json<GlobalDocument>, AppError> {
    let document = command_relay::fetch_document(&state)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(document))
}

#[utoipa::path(
    post,
    path = "/api/global.json",
    tag = "poller",
    request_body = CommandSubmission,
    responses(
        (status = 200, description = "Command appended and relayed", body = CommandAck),
        (status = 400, description = "Malformed command submission")
    )
)]
/// Append a command to the shared document and relay it remotely.
pub async fn submit_command(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CommandSubmission>>,
) -> Result<Json<CommandAck>, AppError> {
    let ack = command_relay::submit(&state, payload)
        .await
        .map_err(ServiceError::from)?;
    Ok(Json(ack))
}

#[utoipa::path(
    get,
    path = "/api/local-buttons",
    tag = "poller",
    responses((status = 200, description = "Current button snapshot", body = Snapshot))
)]
/// Serve the live button snapshot in the polled wire schema.
pub async fn local_buttons(State(state): State<SharedState>) -> Json<Snapshot> {
    Json(sync_engine::export(&state).await)
}

#[utoipa::path(
    post,
    path = "/api/local-buttons",
    tag = "poller",
    request_body = Snapshot,
    responses(
        (status = 200, description = "Snapshot adopted", body = ActionResponse),
        (status = 400, description = "Malformed snapshot")
    )
)]
/// Accept a snapshot pushed by a peer control surface and adopt it.
pub async fn replace_local_buttons(
    State(state): State<SharedState>,
    Json(payload): Json<Snapshot>,
) -> Result<Json<ActionResponse>, AppError> {
    let document = serde_json::to_value(&payload)
        .map_err(|err| AppError::Internal(format!("re-encoding snapshot: {err}")))?;
    let count = sync_engine::import(&state, document).await?;
    Ok(Json(ActionResponse::new(format!(
        "adopted {count} button(s)"
    ))))
}

/// Configure the poller-facing routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new()
        .route("/api/global.json", get(global_document).post(submit_command))
        .route(
            "/api/local-buttons",
            get(local_buttons).post(replace_local_buttons),
        )
}
