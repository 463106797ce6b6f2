//! Orchestration of the button-state synchronization cycle: load on startup,
//! save on every mutation (local mirror unconditionally, network
//! opportunistically), expire stale pulses, and reconcile remote state.

use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::{
    dao::adapter::PersistenceAdapter,
    dto::{
        buttons::{AddButtonRequest, ButtonView},
        snapshot::{ButtonEntry, Snapshot},
    },
    error::ServiceError,
    state::{
        SharedState,
        event_log::Severity,
        registry::{ButtonDefinition, derive_button_id},
        store::{ButtonState, PULSE_DURATION_MS, now_ms},
    },
};

/// Load the initial state: network adapters in priority order, then the local
/// mirror, then the built-in seed. Total failure still leaves the engine
/// ready — never block the operator.
pub async fn initialize(state: &SharedState) {
    for adapter in &state.adapters().network {
        match adapter.load().await {
            Ok(Some(snapshot)) => {
                adopt_snapshot(state, &snapshot).await;
                state
                    .log_event(
                        format!("Buttons loaded from {}", adapter.name()),
                        Severity::Success,
                    )
                    .await;
                // Heal the mirror immediately so a restart works offline.
                mirror_current(state).await;
                return;
            }
            Ok(None) => continue,
            Err(err) => {
                warn!(adapter = adapter.name(), error = %err, "load failed; trying next transport");
                continue;
            }
        }
    }

    match state.adapters().mirror.load().await {
        Ok(Some(snapshot)) => {
            adopt_snapshot(state, &snapshot).await;
            state
                .log_event("Buttons loaded from local mirror", Severity::Info)
                .await;
            return;
        }
        Ok(None) => {}
        Err(err) if err.is_corrupt() => {
            state
                .log_event(
                    "Local mirror is corrupt; discarding and reseeding defaults",
                    Severity::Error,
                )
                .await;
        }
        Err(err) => {
            warn!(error = %err, "local mirror unreadable");
        }
    }

    {
        let mut control = state.control().write().await;
        control.seed(&state.config().seed_buttons);
    }
    state
        .log_event("Seeded built-in default buttons", Severity::Info)
        .await;
    save(state).await;
}

async fn adopt_snapshot(state: &SharedState, snapshot: &Snapshot) {
    state.next_last_update(snapshot.last_update);
    let mut control = state.control().write().await;
    control.apply_snapshot(snapshot);
}

/// Build the current snapshot under the read lock.
async fn current_snapshot(state: &SharedState) -> Snapshot {
    let last_update = state.next_last_update(now_ms());
    let control = state.control().read().await;
    control.to_snapshot(last_update)
}

/// Write the current snapshot to the local mirror only.
async fn mirror_current(state: &SharedState) {
    let snapshot = current_snapshot(state).await;
    if let Err(err) = state.adapters().mirror.save(snapshot).await {
        warn!(error = %err, "mirror write failed");
    }
}

/// Persist the current snapshot: the local mirror is written unconditionally,
/// then network transports are attempted in priority order until one accepts.
/// Network failure degrades to a logged warning, never an operator error.
pub async fn save(state: &SharedState) {
    let snapshot = current_snapshot(state).await;

    if let Err(err) = state.adapters().mirror.save(snapshot.clone()).await {
        warn!(error = %err, "mirror write failed");
        state
            .log_event(
                format!("Local mirror write failed: {err}"),
                Severity::Warning,
            )
            .await;
    }

    for adapter in &state.adapters().network {
        match adapter.save(snapshot.clone()).await {
            Ok(()) => {
                debug!(adapter = adapter.name(), "snapshot saved");
                return;
            }
            Err(err) => {
                warn!(adapter = adapter.name(), error = %err, "save failed; trying next transport");
                state
                    .log_event(
                        format!("{} save failed, falling back: {err}", adapter.name()),
                        Severity::Warning,
                    )
                    .await;
            }
        }
    }
}

/// Activate a button: mark it pressed, persist, and schedule the automatic
/// deactivation at the end of the pulse window.
pub async fn activate(state: &SharedState, id: &str) -> Result<ButtonView, ServiceError> {
    let now = now_ms();
    let (view, label) = {
        let mut control = state.control().write().await;
        let definition = control
            .registry
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("button `{id}` is not registered")))?;
        control.store.activate(id, now);
        let view = ButtonView::from_parts(&definition, control.store.get(id));
        (view, definition.label)
    };

    // Scheduled before the save so the pulse clock is not stretched by
    // transport latency.
    schedule_deactivation(state.clone(), id.to_string());
    state
        .log_event(format!("Button activated: {label}"), Severity::Success)
        .await;
    save(state).await;

    Ok(view)
}

/// Schedule the pulse deactivation for `id`. Re-activation replaces (and
/// aborts) the outstanding task, so the pulse window resets; idempotent expiry
/// covers any straggler that already fired.
fn schedule_deactivation(state: SharedState, id: String) {
    let task_state = state.clone();
    let task_id = id.clone();
    let handle = tokio::spawn(async move {
        sleep(Duration::from_millis(PULSE_DURATION_MS as u64)).await;
        deactivate_if_due(&task_state, &task_id).await;
    });

    if let Some(previous) = state.pulses().insert(id, handle) {
        previous.abort();
    }
}

async fn deactivate_if_due(state: &SharedState, id: &str) {
    let (transitioned, label) = {
        let mut control = state.control().write().await;
        let transitioned = control.store.expire(id, now_ms());
        let label = control
            .registry
            .get(id)
            .map(|definition| definition.label.clone())
            .unwrap_or_else(|| id.to_string());
        (transitioned, label)
    };

    if transitioned {
        state
            .log_event(format!("Button deactivated: {label}"), Severity::Info)
            .await;
        save(state).await;
    }
}

/// Periodic backstop that expires pressed entries past their pulse window and
/// re-persists when anything transitioned. Covers pulses whose scheduled task
/// was lost (import replaced the button, process hiccup).
pub async fn run_expiry_sweep(state: SharedState) {
    let interval = state.config().sweep_interval;
    loop {
        sleep(interval).await;
        let expired = {
            let mut control = state.control().write().await;
            control.store.expire_overdue(now_ms())
        };
        if expired > 0 {
            debug!(expired, "expiry sweep deactivated stale pulses");
            save(&state).await;
        }
    }
}

/// Periodically pull remote state and reconcile it into the store.
pub async fn run_reconcile(state: SharedState) {
    let interval = state.config().reconcile_interval;
    loop {
        sleep(interval).await;
        reconcile_once(&state).await;
    }
}

/// Pull a snapshot from the highest-priority transport that has one and merge
/// it, last-writer-wins per button.
pub async fn reconcile_once(state: &SharedState) {
    for adapter in &state.adapters().network {
        match adapter.load().await {
            Ok(Some(snapshot)) => {
                merge_remote(state, snapshot).await;
                return;
            }
            Ok(None) => continue,
            Err(err) => {
                debug!(adapter = adapter.name(), error = %err, "reconcile pull failed");
                continue;
            }
        }
    }
}

async fn merge_remote(state: &SharedState, snapshot: Snapshot) {
    state.next_last_update(snapshot.last_update);

    let adopted = {
        let mut control = state.control().write().await;
        let mut adopted = 0;
        for (id, entry) in &snapshot.buttons {
            if !control.registry.contains(id) {
                control.registry.upsert(definition_from_entry(id, entry));
                control.store.register(id);
            }
            let remote = ButtonState {
                state: entry.state,
                timestamp: entry.timestamp,
            };
            if control.store.merge(id, remote) {
                adopted += 1;
            }
        }
        adopted
    };

    if adopted > 0 {
        state
            .log_event(
                format!("Reconciled {adopted} remote button update(s)"),
                Severity::Info,
            )
            .await;
        mirror_current(state).await;
    }
}

fn definition_from_entry(id: &str, entry: &ButtonEntry) -> ButtonDefinition {
    ButtonDefinition {
        id: id.to_string(),
        label: entry.label.clone(),
        icon: entry.icon.clone(),
        page: entry.page,
        row: entry.row,
        col: entry.col,
    }
}

/// Register a new button. The identifier is derived from the label, and a
/// collision after normalization is rejected without touching the registry.
pub async fn add_button(
    state: &SharedState,
    request: AddButtonRequest,
) -> Result<ButtonView, ServiceError> {
    let id = derive_button_id(&request.label);
    if id.is_empty() {
        return Err(ServiceError::InvalidInput(format!(
            "label `{}` yields an empty identifier",
            request.label
        )));
    }

    let view = {
        let mut control = state.control().write().await;
        let definition = ButtonDefinition {
            id: id.clone(),
            label: request.label,
            icon: request.icon,
            page: request.page,
            row: request.row,
            col: request.col,
        };
        control
            .registry
            .insert(definition.clone())
            .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
        control.store.register(&id);
        ButtonView::from_parts(&definition, control.store.get(&id))
    };

    state
        .log_event(format!("Button added: {}", view.label), Severity::Success)
        .await;
    save(state).await;

    Ok(view)
}

/// Remove a button; removing an unknown id is a no-op.
pub async fn remove_button(state: &SharedState, id: &str) -> Option<ButtonDefinition> {
    let removed = {
        let mut control = state.control().write().await;
        let removed = control.registry.remove(id);
        if removed.is_some() {
            control.store.remove(id);
        }
        removed
    };

    if let Some(definition) = &removed {
        if let Some((_, handle)) = state.pulses().remove(id) {
            handle.abort();
        }
        state
            .log_event(
                format!("Button removed: {}", definition.label),
                Severity::Info,
            )
            .await;
        save(state).await;
    }

    removed
}

/// Replace registry and state wholesale from an imported document. The
/// document must carry a `buttons` mapping; anything else is rejected with the
/// state left untouched.
pub async fn import(state: &SharedState, document: Value) -> Result<usize, ServiceError> {
    let Some(buttons) = document.get("buttons") else {
        return Err(ServiceError::InvalidInput(
            "import document is missing the `buttons` map".into(),
        ));
    };
    if !buttons.is_object() {
        return Err(ServiceError::InvalidInput(
            "`buttons` must be a mapping of button ids".into(),
        ));
    }

    let buttons: indexmap::IndexMap<String, ButtonEntry> =
        serde_json::from_value(buttons.clone()).map_err(|err| {
            ServiceError::InvalidInput(format!("malformed `buttons` entries: {err}"))
        })?;

    let count = buttons.len();
    let snapshot = Snapshot {
        last_update: document
            .get("lastUpdate")
            .and_then(Value::as_i64)
            .unwrap_or_else(now_ms),
        buttons,
    };

    adopt_snapshot(state, &snapshot).await;
    state
        .log_event(format!("Imported {count} button(s)"), Severity::Success)
        .await;
    save(state).await;

    Ok(count)
}

/// Export the current registry plus state in the snapshot wire schema.
pub async fn export(state: &SharedState) -> Snapshot {
    current_snapshot(state).await
}

/// Clear persisted state and reseed the built-in defaults.
pub async fn reset(state: &SharedState) {
    for entry in state.pulses().iter() {
        entry.value().abort();
    }
    state.pulses().clear();

    if let Err(err) = state
        .adapters()
        .mirror
        .remove(crate::dao::adapter::file_store::BUTTONS_KEY)
        .await
    {
        warn!(error = %err, "failed to clear mirrored snapshot");
    }

    {
        let mut control = state.control().write().await;
        control.seed(&state.config().seed_buttons);
    }
    state
        .log_event("Configuration reset to defaults", Severity::Info)
        .await;
    save(state).await;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::adapter::{AdapterSet, file_store::FileStore},
        state::{AppState, SharedState},
    };

    fn test_state() -> SharedState {
        let dir = std::env::temp_dir().join(format!("cs2-relay-engine-{}", uuid::Uuid::new_v4()));
        let mirror = FileStore::new(dir);
        let config = AppConfig {
            state_dir: std::env::temp_dir(),
            local_api_url: None,
            ..AppConfig::default()
        };
        AppState::new(config, "cs2-test-session".into(), AdapterSet::mirror_only(mirror))
    }

    async fn seeded_state() -> SharedState {
        let state = test_state();
        initialize(&state).await;
        state
    }

    #[tokio::test]
    async fn initialize_without_transports_seeds_defaults() {
        let state = seeded_state().await;
        let control = state.control().read().await;
        assert_eq!(control.registry.len(), 6);
        assert!(control.registry.contains("bomb_planted"));
    }

    #[tokio::test]
    async fn initialize_prefers_mirrored_snapshot_over_seed() {
        let state = test_state();
        {
            let mut control = state.control().write().await;
            control.seed_defaults();
            control.store.activate("round_end", 7_777);
        }
        mirror_current(&state).await;

        let restarted = AppState::new(
            state.config().clone(),
            "cs2-test-session".into(),
            AdapterSet::mirror_only(Arc::clone(&state.adapters().mirror)),
        );
        initialize(&restarted).await;

        let control = restarted.control().read().await;
        assert_eq!(control.store.get("round_end").timestamp, 7_777);
    }

    #[tokio::test]
    async fn export_import_round_trips() {
        let state = seeded_state().await;
        activate(&state, "bomb_planted").await.unwrap();

        let exported = export(&state).await;
        let (registry_before, states_before) = {
            let control = state.control().read().await;
            let states: Vec<_> = control
                .store
                .iter()
                .map(|(id, s)| (id.clone(), *s))
                .collect();
            (control.registry.clone(), states)
        };

        let document = serde_json::to_value(&exported).unwrap();
        let count = import(&state, document).await.unwrap();
        assert_eq!(count, 6);

        let control = state.control().read().await;
        assert_eq!(control.registry, registry_before);
        for (id, before) in states_before {
            assert_eq!(control.store.get(&id), before);
        }
    }

    #[tokio::test]
    async fn import_without_buttons_map_leaves_state_untouched() {
        let state = seeded_state().await;
        let before = export(&state).await.buttons;

        let err = import(&state, serde_json::json!({"version": "1.0"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let err = import(&state, serde_json::json!({"buttons": [1, 2]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        assert_eq!(export(&state).await.buttons, before);
    }

    #[tokio::test]
    async fn add_rejects_colliding_normalized_label() {
        let state = seeded_state().await;
        let request = AddButtonRequest {
            label: "Bomb PLANTED!".into(),
            icon: "fas fa-bomb".into(),
            page: 2,
            row: 2,
            col: 2,
        };

        let err = add_button(&state, request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));

        let control = state.control().read().await;
        assert_eq!(control.registry.len(), 6);
        // The original definition survives unchanged.
        assert_eq!(control.registry.get("bomb_planted").unwrap().page, 1);
    }

    #[tokio::test]
    async fn remove_unknown_is_noop() {
        let state = seeded_state().await;
        assert!(remove_button(&state, "no_such_button").await.is_none());
        let control = state.control().read().await;
        assert_eq!(control.registry.len(), 6);
    }

    #[tokio::test]
    async fn activate_marks_pressed_and_merge_remote_wins_when_newer() {
        let state = seeded_state().await;
        let view = activate(&state, "clutch_mode").await.unwrap();
        assert_eq!(view.state, crate::state::store::PulseState::Pressed);

        let remote_ts = view.timestamp + 10;
        let mut snapshot = export(&state).await;
        if let Some(entry) = snapshot.buttons.get_mut("clutch_mode") {
            entry.state = crate::state::store::PulseState::Idle;
            entry.timestamp = remote_ts;
        }
        merge_remote(&state, snapshot).await;

        let control = state.control().read().await;
        assert_eq!(control.store.get("clutch_mode").timestamp, remote_ts);
        assert!(!control.store.get("clutch_mode").is_pressed());
    }

    #[tokio::test]
    async fn pulse_deactivates_automatically_and_resaves() {
        let state = seeded_state().await;
        let view = activate(&state, "bomb_planted").await.unwrap();

        sleep(Duration::from_millis(PULSE_DURATION_MS as u64 + 400)).await;

        {
            let control = state.control().read().await;
            let after = control.store.get("bomb_planted");
            assert!(!after.is_pressed());
            assert!(after.timestamp >= view.timestamp + PULSE_DURATION_MS);
        }

        // The reversion must be visible to remote observers via the mirror.
        let mirrored = state.adapters().mirror.load().await.unwrap().unwrap();
        assert_eq!(
            mirrored.buttons["bomb_planted"].state,
            crate::state::store::PulseState::Idle
        );
    }

    #[tokio::test]
    async fn reactivation_mid_pulse_keeps_button_pressed() {
        let state = seeded_state().await;
        activate(&state, "round_start").await.unwrap();
        sleep(Duration::from_millis(1_200)).await;
        activate(&state, "round_start").await.unwrap();

        // Past the first activation's deadline, inside the second's window.
        sleep(Duration::from_millis(1_200)).await;
        {
            let control = state.control().read().await;
            assert!(control.store.get("round_start").is_pressed());
        }

        // The refreshed window expires on its own schedule.
        sleep(Duration::from_millis(1_100)).await;
        let control = state.control().read().await;
        assert!(!control.store.get("round_start").is_pressed());
    }

    #[tokio::test]
    async fn reset_reseeds_defaults() {
        let state = seeded_state().await;
        add_button(
            &state,
            AddButtonRequest {
                label: "Head Shot".into(),
                icon: "fas fa-target".into(),
                page: 1,
                row: 2,
                col: 3,
            },
        )
        .await
        .unwrap();

        reset(&state).await;

        let control = state.control().read().await;
        assert_eq!(control.registry.len(), 6);
        assert!(!control.registry.contains("head_shot"));
    }
}
