//! Operator-facing DTOs for the button management surface.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::{
    registry::{ButtonDefinition, DEFAULT_ICON},
    store::{ButtonState, PulseState},
};

/// Request to add a button; the identifier is derived from the label.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddButtonRequest {
    /// Display label the identifier is derived from.
    #[validate(length(min = 1, message = "label must not be empty"))]
    pub label: String,
    /// Display icon reference.
    #[serde(default = "default_icon")]
    pub icon: String,
    /// Companion grid page.
    #[validate(range(min = 1))]
    pub page: u32,
    /// Companion grid row.
    #[validate(range(min = 1))]
    pub row: u32,
    /// Companion grid column.
    #[validate(range(min = 1))]
    pub col: u32,
}

fn default_icon() -> String {
    DEFAULT_ICON.to_string()
}

/// A button definition joined with its live state.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ButtonView {
    /// Stable identifier.
    pub id: String,
    /// Display label.
    pub label: String,
    /// Display icon reference.
    pub icon: String,
    /// Companion grid page.
    pub page: u32,
    /// Companion grid row.
    pub row: u32,
    /// Companion grid column.
    pub col: u32,
    /// `"+"` while pressed, `"-"` while idle.
    pub state: PulseState,
    /// Milliseconds since epoch of the last transition.
    pub timestamp: i64,
}

impl ButtonView {
    /// Join a definition with its current state.
    pub fn from_parts(definition: &ButtonDefinition, state: ButtonState) -> Self {
        Self {
            id: definition.id.clone(),
            label: definition.label.clone(),
            icon: definition.icon.clone(),
            page: definition.page,
            row: definition.row,
            col: definition.col,
            state: state.state,
            timestamp: state.timestamp,
        }
    }
}

/// Response for the button listing route.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ButtonsResponse {
    /// Whether the priority network transport is currently reachable.
    pub connected: bool,
    /// All registered buttons with their live states.
    pub buttons: Vec<ButtonView>,
}

/// Generic acknowledgement for mutations without a richer payload.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ActionResponse {
    /// Human-readable outcome.
    pub message: String,
}

impl ActionResponse {
    /// Acknowledgement with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
