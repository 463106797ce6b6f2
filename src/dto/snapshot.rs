//! The externally-visible snapshot schema polled by the GSI companion.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{registry::DEFAULT_ICON, store::PulseState};

/// One button inside a [`Snapshot`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ButtonEntry {
    /// `"+"` while pressed, `"-"` while idle.
    pub state: PulseState,
    /// Milliseconds since epoch of the last transition.
    pub timestamp: i64,
    /// Companion grid page.
    pub page: u32,
    /// Companion grid row.
    pub row: u32,
    /// Companion grid column.
    pub col: u32,
    /// Human-readable name.
    pub label: String,
    /// Display icon reference; older documents may omit it.
    #[serde(default = "default_icon")]
    pub icon: String,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

/// Full serialized state of all buttons at one instant. Only the sync engine
/// constructs these; adapters transport the bytes without touching semantics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Milliseconds since epoch; monotonically non-decreasing per writer.
    pub last_update: i64,
    /// Buttons keyed by identifier, in display order.
    pub buttons: IndexMap<String, ButtonEntry>,
}

impl Snapshot {
    /// Snapshot with no buttons.
    pub fn empty(last_update: i64) -> Self {
        Self {
            last_update,
            buttons: IndexMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wire_field_names() {
        let mut snapshot = Snapshot::empty(1_700_000_000_000);
        snapshot.buttons.insert(
            "bomb_planted".into(),
            ButtonEntry {
                state: PulseState::Pressed,
                timestamp: 1_700_000_000_000,
                page: 1,
                row: 1,
                col: 1,
                label: "Bomb Planted".into(),
                icon: "fas fa-bomb".into(),
            },
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["lastUpdate"], 1_700_000_000_000_i64);
        assert_eq!(json["buttons"]["bomb_planted"]["state"], "+");
        assert_eq!(json["buttons"]["bomb_planted"]["label"], "Bomb Planted");
    }

    #[test]
    fn missing_icon_falls_back_to_default() {
        let json = r#"{
            "lastUpdate": 5,
            "buttons": {
                "round_start": {
                    "state": "-", "timestamp": 0,
                    "page": 1, "row": 1, "col": 3, "label": "Round Start"
                }
            }
        }"#;
        let snapshot: Snapshot = serde_json::from_str(json).unwrap();
        assert_eq!(snapshot.buttons["round_start"].icon, DEFAULT_ICON);
    }
}
