//! Authoritative in-memory button state and the pulse/merge rules.

use std::time::{SystemTime, UNIX_EPOCH};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// How long a button stays pressed after activation before auto-reverting.
pub const PULSE_DURATION_MS: i64 = 2_000;

/// Milliseconds since the Unix epoch.
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Transient press state of a button, serialized as the literal `"+"` / `"-"`
/// characters the companion poller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum PulseState {
    /// Button is inside its 2-second pulse window.
    #[serde(rename = "+")]
    Pressed,
    /// Button is at rest.
    #[serde(rename = "-")]
    Idle,
}

/// State of a single button: press state plus the time of its last transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ButtonState {
    /// Current press state.
    pub state: PulseState,
    /// Milliseconds since epoch of the last transition.
    pub timestamp: i64,
}

impl ButtonState {
    /// Default state for a button that has never been activated.
    pub fn idle() -> Self {
        Self {
            state: PulseState::Idle,
            timestamp: 0,
        }
    }

    /// Whether this state is currently pressed.
    pub fn is_pressed(&self) -> bool {
        self.state == PulseState::Pressed
    }
}

impl Default for ButtonState {
    fn default() -> Self {
        Self::idle()
    }
}

/// In-memory map of button id to its live state. Insertion-ordered so
/// snapshots serialize in a stable order.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    entries: IndexMap<String, ButtonState>,
}

impl StateStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state for `id`, defaulting to idle for unknown buttons.
    pub fn get(&self, id: &str) -> ButtonState {
        self.entries.get(id).copied().unwrap_or_default()
    }

    /// Register a button with the default idle state unless already tracked.
    pub fn register(&mut self, id: &str) {
        self.entries.entry(id.to_string()).or_default();
    }

    /// Drop the state entry for a removed button.
    pub fn remove(&mut self, id: &str) {
        self.entries.shift_remove(id);
    }

    /// Mark `id` pressed at `now`.
    pub fn activate(&mut self, id: &str, now: i64) {
        self.entries.insert(
            id.to_string(),
            ButtonState {
                state: PulseState::Pressed,
                timestamp: now,
            },
        );
    }

    /// Revert `id` to idle if it has been pressed for a full pulse duration.
    ///
    /// Idempotent: stragglers from overlapping pulse timers are harmless, and
    /// a re-activation refreshes the timestamp so an older timer no-ops.
    pub fn expire(&mut self, id: &str, now: i64) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) if entry.is_pressed() && now - entry.timestamp >= PULSE_DURATION_MS => {
                entry.state = PulseState::Idle;
                entry.timestamp = now;
                true
            }
            _ => false,
        }
    }

    /// Expire every pressed entry past its pulse window, returning how many
    /// transitioned.
    pub fn expire_overdue(&mut self, now: i64) -> usize {
        let overdue: Vec<String> = self
            .entries
            .iter()
            .filter(|(_, state)| state.is_pressed() && now - state.timestamp >= PULSE_DURATION_MS)
            .map(|(id, _)| id.clone())
            .collect();
        overdue.iter().filter(|id| self.expire(id, now)).count()
    }

    /// Reconcile a remote observation: last-writer-wins by timestamp. The
    /// remote state is adopted verbatim only when its timestamp is strictly
    /// greater; ties favor local so two loosely-synchronized writers cannot
    /// oscillate.
    pub fn merge(&mut self, id: &str, remote: ButtonState) -> bool {
        let local = self.get(id);
        if remote.timestamp > local.timestamp {
            self.entries.insert(id.to_string(), remote);
            true
        } else {
            false
        }
    }

    /// Iterate over tracked entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ButtonState)> {
        self.entries.iter()
    }

    /// Number of tracked buttons.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_button_reads_idle() {
        let store = StateStore::new();
        assert_eq!(store.get("bomb_planted"), ButtonState::idle());
    }

    #[test]
    fn pulse_holds_until_duration_elapses() {
        let mut store = StateStore::new();
        let t = 1_000_000;
        store.activate("bomb_planted", t);

        assert!(store.get("bomb_planted").is_pressed());

        // Just inside the window: expiry must not fire.
        assert!(!store.expire("bomb_planted", t + PULSE_DURATION_MS - 1));
        assert!(store.get("bomb_planted").is_pressed());

        // At the boundary the button reverts.
        assert!(store.expire("bomb_planted", t + PULSE_DURATION_MS));
        let state = store.get("bomb_planted");
        assert_eq!(state.state, PulseState::Idle);
        assert_eq!(state.timestamp, t + PULSE_DURATION_MS);
    }

    #[test]
    fn expire_is_idempotent() {
        let mut store = StateStore::new();
        let t = 5_000;
        store.activate("round_start", t);

        let now = t + PULSE_DURATION_MS;
        assert!(store.expire("round_start", now));
        let after_first = store.get("round_start");

        assert!(!store.expire("round_start", now));
        assert_eq!(store.get("round_start"), after_first);
    }

    #[test]
    fn reactivation_refreshes_pulse_so_stale_timer_noops() {
        let mut store = StateStore::new();
        store.activate("ace_moment", 1_000);
        store.activate("ace_moment", 2_500);

        // A timer scheduled by the first activation fires at 3_000 and finds
        // the fresh press still inside its window.
        assert!(!store.expire("ace_moment", 3_000));
        assert!(store.get("ace_moment").is_pressed());
    }

    #[test]
    fn merge_adopts_strictly_newer_remote() {
        let mut store = StateStore::new();
        store.activate("clutch_mode", 1_000);

        let remote = ButtonState {
            state: PulseState::Idle,
            timestamp: 2_000,
        };
        assert!(store.merge("clutch_mode", remote));
        assert_eq!(store.get("clutch_mode"), remote);
    }

    #[test]
    fn merge_tie_favors_local() {
        let mut store = StateStore::new();
        store.activate("clutch_mode", 1_000);
        let local = store.get("clutch_mode");

        let remote = ButtonState {
            state: PulseState::Idle,
            timestamp: 1_000,
        };
        assert!(!store.merge("clutch_mode", remote));
        assert_eq!(store.get("clutch_mode"), local);

        let older = ButtonState {
            state: PulseState::Idle,
            timestamp: 500,
        };
        assert!(!store.merge("clutch_mode", older));
        assert_eq!(store.get("clutch_mode"), local);
    }

    #[test]
    fn expire_overdue_sweeps_only_stale_presses() {
        let mut store = StateStore::new();
        store.activate("a", 0);
        store.activate("b", 1_500);
        store.register("c");

        assert_eq!(store.expire_overdue(2_000), 1);
        assert_eq!(store.get("a").state, PulseState::Idle);
        assert!(store.get("b").is_pressed());
    }

    #[test]
    fn pulse_state_serializes_as_plus_minus() {
        assert_eq!(serde_json::to_string(&PulseState::Pressed).unwrap(), "\"+\"");
        assert_eq!(serde_json::to_string(&PulseState::Idle).unwrap(), "\"-\"");
        let parsed: PulseState = serde_json::from_str("\"+\"").unwrap();
        assert_eq!(parsed, PulseState::Pressed);
    }
}
