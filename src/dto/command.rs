//! Command wire types for the multi-client relay surface.

use rand::{Rng, distr::Alphanumeric};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::state::store::now_ms;

/// An at-most-once-intended instruction relayed from a control surface to the
/// poller. Immutable once created; only the consumer flips `executed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Command {
    /// Unique identifier (epoch millis plus a random suffix).
    pub id: String,
    /// Named action, e.g. `live`, `pause`, `stop`.
    pub action: String,
    /// Companion grid page.
    pub page: u32,
    /// Companion grid row.
    pub row: u32,
    /// Companion grid column.
    pub col: u32,
    /// Milliseconds since epoch when the command was created.
    pub timestamp: i64,
    /// Whether the consumer has acted on the command.
    pub executed: bool,
}

/// Operator-submitted command body. Identifier and timestamp are filled in
/// server-side when absent so hand-written payloads stay minimal.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CommandSubmission {
    /// Named action to relay.
    #[validate(length(min = 1, message = "action must not be empty"))]
    pub action: String,
    /// Companion grid page.
    #[serde(default = "default_coord")]
    #[validate(range(min = 1))]
    pub page: u32,
    /// Companion grid row.
    #[serde(default = "default_coord")]
    #[validate(range(min = 1))]
    pub row: u32,
    /// Companion grid column.
    #[serde(default = "default_coord")]
    #[validate(range(min = 1))]
    pub col: u32,
    /// Caller-supplied identifier, generated when omitted.
    #[serde(default)]
    pub id: Option<String>,
    /// Caller-supplied timestamp, stamped server-side when omitted.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

fn default_coord() -> u32 {
    1
}

impl Command {
    /// Materialize a submission into a relayable command.
    pub fn from_submission(submission: CommandSubmission) -> Self {
        let timestamp = submission.timestamp.unwrap_or_else(now_ms);
        let id = submission.id.unwrap_or_else(|| generate_command_id(timestamp));
        Self {
            id,
            action: submission.action,
            page: submission.page,
            row: submission.row,
            col: submission.col,
            timestamp,
            executed: false,
        }
    }
}

/// Command id in the original controllers' shape: epoch millis concatenated
/// with a short random alphanumeric suffix.
pub fn generate_command_id(timestamp: i64) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(char::from)
        .collect();
    format!("{timestamp}{}", suffix.to_lowercase())
}

/// Acknowledgement returned after a command is appended.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CommandAck {
    /// Always `true`; failures surface as HTTP errors instead.
    pub success: bool,
    /// The command as persisted, with generated fields filled in.
    pub command: Command,
}

#[cfg(test)]
mod tests {
    use super::*;
    use validator::Validate;

    #[test]
    fn submission_fills_generated_fields() {
        let submission = CommandSubmission {
            action: "live".into(),
            page: 1,
            row: 2,
            col: 3,
            id: None,
            timestamp: None,
        };
        let command = Command::from_submission(submission);
        assert!(!command.executed);
        assert!(command.timestamp > 0);
        assert!(command.id.starts_with(&command.timestamp.to_string()));
        assert_eq!(command.id.len(), command.timestamp.to_string().len() + 5);
    }

    #[test]
    fn empty_action_fails_validation() {
        let submission = CommandSubmission {
            action: "".into(),
            page: 1,
            row: 1,
            col: 1,
            id: None,
            timestamp: None,
        };
        assert!(submission.validate().is_err());
    }

    #[test]
    fn coordinates_default_to_one() {
        let submission: CommandSubmission =
            serde_json::from_str(r#"{"action": "pause"}"#).unwrap();
        assert_eq!((submission.page, submission.row, submission.col), (1, 1, 1));
    }
}
