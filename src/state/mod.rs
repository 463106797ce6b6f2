//! Shared application state: button registry, live press states, event log,
//! connectivity flag, and the persistence adapter set.

/// Bounded operator event log.
pub mod event_log;
/// Button definitions and identifier derivation.
pub mod registry;
/// SSE broadcast hub.
mod sse;
/// Press-state store with pulse and merge semantics.
pub mod store;

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use dashmap::DashMap;
use tokio::{
    sync::{Mutex, RwLock, watch},
    task::JoinHandle,
};

use crate::{
    config::AppConfig,
    dao::adapter::AdapterSet,
    dto::{events::ServerEvent, snapshot::{ButtonEntry, Snapshot}},
    state::{
        event_log::{EventLog, LogEntry, Severity},
        registry::{ButtonDefinition, ButtonRegistry},
        store::{ButtonState, StateStore},
    },
};

pub use self::sse::SseHub;

/// Cheaply cloneable handle to the application state.
pub type SharedState = Arc<AppState>;

/// Registry plus live state, guarded together so every mutation observes a
/// consistent pair. Mirrors the run-to-completion semantics of the original
/// single-threaded controllers.
#[derive(Debug, Clone, Default)]
pub struct ControlState {
    /// Button definitions in display order.
    pub registry: ButtonRegistry,
    /// Live press states.
    pub store: StateStore,
}

impl ControlState {
    /// Reseed from the given definitions, discarding everything else.
    pub fn seed(&mut self, definitions: &[ButtonDefinition]) {
        let mut registry = ButtonRegistry::new();
        let mut store = StateStore::new();
        for definition in definitions {
            registry.upsert(definition.clone());
            store.register(&definition.id);
        }
        self.registry = registry;
        self.store = store;
    }

    /// Reseed the built-in defaults.
    pub fn seed_defaults(&mut self) {
        self.seed(&crate::state::registry::default_buttons());
    }

    /// Build the externally-visible snapshot from registry plus store.
    pub fn to_snapshot(&self, last_update: i64) -> Snapshot {
        let mut snapshot = Snapshot::empty(last_update);
        for definition in self.registry.iter() {
            let state = self.store.get(&definition.id);
            snapshot.buttons.insert(
                definition.id.clone(),
                ButtonEntry {
                    state: state.state,
                    timestamp: state.timestamp,
                    page: definition.page,
                    row: definition.row,
                    col: definition.col,
                    label: definition.label.clone(),
                    icon: definition.icon.clone(),
                },
            );
        }
        snapshot
    }

    /// Replace registry and store wholesale from a snapshot document.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        let mut registry = ButtonRegistry::new();
        let mut store = StateStore::new();
        for (id, entry) in &snapshot.buttons {
            registry.upsert(ButtonDefinition {
                id: id.clone(),
                label: entry.label.clone(),
                icon: entry.icon.clone(),
                page: entry.page,
                row: entry.row,
                col: entry.col,
            });
            store.register(id);
            store.merge(
                id,
                ButtonState {
                    state: entry.state,
                    timestamp: entry.timestamp,
                },
            );
        }
        self.registry = registry;
        self.store = store;
    }
}

/// Central application state shared across routes and background tasks.
pub struct AppState {
    config: AppConfig,
    session_id: String,
    adapters: AdapterSet,
    control: RwLock<ControlState>,
    event_log: RwLock<EventLog>,
    events: SseHub,
    connected: watch::Sender<bool>,
    last_update: AtomicI64,
    pulses: DashMap<String, JoinHandle<()>>,
    command_gate: Mutex<()>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig, session_id: String, adapters: AdapterSet) -> SharedState {
        let (connected_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            config,
            session_id,
            adapters,
            control: RwLock::new(ControlState::default()),
            event_log: RwLock::new(EventLog::default()),
            events: SseHub::new(16),
            connected: connected_tx,
            last_update: AtomicI64::new(0),
            pulses: DashMap::new(),
            command_gate: Mutex::new(()),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Stable session identifier for this controller instance.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// The persistence adapters in priority order.
    pub fn adapters(&self) -> &AdapterSet {
        &self.adapters
    }

    /// Guarded registry-plus-store pair.
    pub fn control(&self) -> &RwLock<ControlState> {
        &self.control
    }

    /// Append to the event log and fan the entry out to SSE subscribers.
    pub async fn log_event(&self, message: impl Into<String>, severity: Severity) -> LogEntry {
        let entry = {
            let mut log = self.event_log.write().await;
            log.append(message, severity)
        };
        if let Ok(event) = ServerEvent::json(Some("log".to_string()), &entry) {
            self.events.broadcast(event);
        }
        entry
    }

    /// Snapshot of the event log, most recent first.
    pub async fn log_entries(&self) -> Vec<LogEntry> {
        self.event_log.read().await.entries()
    }

    /// Broadcast hub feeding the SSE stream.
    pub fn events(&self) -> &SseHub {
        &self.events
    }

    /// Current connectivity flag.
    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }

    /// Subscribe to connectivity changes.
    pub fn connected_watcher(&self) -> watch::Receiver<bool> {
        self.connected.subscribe()
    }

    /// Update the connectivity flag, returning whether it changed.
    pub fn set_connected(&self, value: bool) -> bool {
        let changed = *self.connected.borrow() != value;
        if changed {
            let _ = self.connected.send(value);
        }
        changed
    }

    /// Next snapshot `lastUpdate`, monotonically non-decreasing even if the
    /// wall clock steps backwards.
    pub fn next_last_update(&self, now: i64) -> i64 {
        let previous = self.last_update.fetch_max(now, Ordering::SeqCst);
        previous.max(now)
    }

    /// Outstanding pulse deactivation tasks keyed by button id.
    pub fn pulses(&self) -> &DashMap<String, JoinHandle<()>> {
        &self.pulses
    }

    /// Gate serializing read-modify-write cycles of the command document.
    pub fn command_gate(&self) -> &Mutex<()> {
        &self.command_gate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::PulseState;

    #[test]
    fn snapshot_round_trips_registry_and_store() {
        let mut control = ControlState::default();
        control.seed_defaults();
        control.store.activate("bomb_planted", 42_000);

        let snapshot = control.to_snapshot(99_000);

        let mut restored = ControlState::default();
        restored.apply_snapshot(&snapshot);

        assert_eq!(restored.registry, control.registry);
        assert_eq!(
            restored.store.get("bomb_planted"),
            control.store.get("bomb_planted")
        );
        assert_eq!(restored.store.len(), control.store.len());
        for (id, state) in control.store.iter() {
            assert_eq!(&restored.store.get(id), state);
        }
    }

    #[test]
    fn snapshot_carries_wire_fields() {
        let mut control = ControlState::default();
        control.seed_defaults();
        control.store.activate("round_start", 1_234);

        let snapshot = control.to_snapshot(5_678);
        assert_eq!(snapshot.last_update, 5_678);

        let entry = snapshot.buttons.get("round_start").unwrap();
        assert_eq!(entry.state, PulseState::Pressed);
        assert_eq!(entry.timestamp, 1_234);
        assert_eq!(entry.page, 1);
        assert_eq!(entry.row, 1);
        assert_eq!(entry.col, 3);
        assert_eq!(entry.label, "Round Start");
    }
}
