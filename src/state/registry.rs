//! Button definitions and the registry mapping ids to grid metadata.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Icon used when none is supplied.
pub const DEFAULT_ICON: &str = "fas fa-play";

/// Display metadata and grid coordinates for one trigger button.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonDefinition {
    /// Stable identifier derived from the label, unique within the registry.
    pub id: String,
    /// Human-readable name shown to the operator.
    pub label: String,
    /// Opaque display reference (an icon class in the web frontends).
    pub icon: String,
    /// Companion grid page.
    pub page: u32,
    /// Companion grid row.
    pub row: u32,
    /// Companion grid column.
    pub col: u32,
}

/// Error raised when adding a button whose derived id is already taken.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("a button with id `{id}` already exists")]
pub struct DuplicateButton {
    /// The colliding identifier.
    pub id: String,
}

/// Ordered mapping from button id to its definition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ButtonRegistry {
    buttons: IndexMap<String, ButtonDefinition>,
}

/// Derive a stable identifier from a display label: trimmed, lower-cased,
/// whitespace runs collapsed to `_`, everything outside `[a-z0-9_]` stripped.
pub fn derive_button_id(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let joined = lowered.split_whitespace().collect::<Vec<_>>().join("_");
    joined
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_')
        .collect()
}

impl ButtonRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a definition, rejecting a duplicate id without touching the
    /// registry. Two distinct labels that collide after normalization must be
    /// rejected, not silently overwritten.
    pub fn insert(&mut self, definition: ButtonDefinition) -> Result<(), DuplicateButton> {
        if self.buttons.contains_key(&definition.id) {
            return Err(DuplicateButton {
                id: definition.id.clone(),
            });
        }
        self.buttons.insert(definition.id.clone(), definition);
        Ok(())
    }

    /// Insert-or-replace without duplicate checking (reconcile/import path).
    pub fn upsert(&mut self, definition: ButtonDefinition) {
        self.buttons.insert(definition.id.clone(), definition);
    }

    /// Remove a button; a no-op when the id is absent.
    pub fn remove(&mut self, id: &str) -> Option<ButtonDefinition> {
        self.buttons.shift_remove(id)
    }

    /// Look up a definition.
    pub fn get(&self, id: &str) -> Option<&ButtonDefinition> {
        self.buttons.get(id)
    }

    /// Whether the id is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.buttons.contains_key(id)
    }

    /// Iterate over definitions in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &ButtonDefinition> {
        self.buttons.values()
    }

    /// Number of registered buttons.
    pub fn len(&self) -> usize {
        self.buttons.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.buttons.is_empty()
    }
}

/// Built-in seed used when no persisted snapshot can be loaded.
pub fn default_buttons() -> Vec<ButtonDefinition> {
    let seed = [
        ("Bomb Planted", "fas fa-bomb", 1, 1, 1),
        ("Bomb Defused", "fas fa-shield-alt", 1, 1, 2),
        ("Round Start", "fas fa-play", 1, 1, 3),
        ("Round End", "fas fa-stop", 1, 1, 4),
        ("Clutch Mode", "fas fa-crosshairs", 1, 2, 1),
        ("Ace Moment", "fas fa-crown", 1, 2, 2),
    ];

    seed.into_iter()
        .map(|(label, icon, page, row, col)| ButtonDefinition {
            id: derive_button_id(label),
            label: label.to_string(),
            icon: icon.to_string(),
            page,
            row,
            col,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_registry() -> ButtonRegistry {
        let mut registry = ButtonRegistry::new();
        for definition in default_buttons() {
            registry.insert(definition).unwrap();
        }
        registry
    }

    #[test]
    fn derives_id_by_stripping_punctuation() {
        assert_eq!(derive_button_id("Bomb Planted!"), "bomb_planted");
    }

    #[test]
    fn derives_id_by_collapsing_whitespace() {
        assert_eq!(derive_button_id("  Ace   Moment  "), "ace_moment");
    }

    #[test]
    fn derives_id_keeps_digits_and_underscores() {
        assert_eq!(derive_button_id("Round 2 _ GO"), "round_2___go");
    }

    #[test]
    fn duplicate_insert_leaves_registry_unchanged() {
        let mut registry = ButtonRegistry::new();
        let first = ButtonDefinition {
            id: "bomb_planted".into(),
            label: "Bomb Planted".into(),
            icon: "fas fa-bomb".into(),
            page: 1,
            row: 1,
            col: 1,
        };
        registry.insert(first.clone()).unwrap();

        // A different label normalizing to the same id must be rejected.
        let colliding = ButtonDefinition {
            label: "bomb PLANTED?".into(),
            col: 4,
            ..first.clone()
        };
        let err = registry.insert(colliding).unwrap_err();
        assert_eq!(err.id, "bomb_planted");
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("bomb_planted"), Some(&first));
    }

    #[test]
    fn remove_absent_is_noop() {
        let mut registry = seeded_registry();
        let before = registry.len();
        assert!(registry.remove("no_such_button").is_none());
        assert_eq!(registry.len(), before);
    }

    #[test]
    fn defaults_seed_the_six_stock_buttons() {
        let registry = seeded_registry();
        assert_eq!(registry.len(), 6);
        for id in [
            "bomb_planted",
            "bomb_defused",
            "round_start",
            "round_end",
            "clutch_mode",
            "ace_moment",
        ] {
            assert!(registry.contains(id), "missing default `{id}`");
        }
    }
}
