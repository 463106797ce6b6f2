use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::command::Command,
    state::store::now_ms,
};

/// Version string written into freshly created command documents.
pub const DOCUMENT_VERSION: &str = "2.0";

/// Maximum number of commands retained inside the shared command document.
pub const COMMAND_DOCUMENT_CAP: usize = 50;

/// The command document served at `/api/global.json` and mirrored to the
/// snippet backend. This is the wire format the GSI companion polls.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalDocument {
    /// Bounded, oldest-dropped command history.
    pub commands: Vec<Command>,
    /// Milliseconds since epoch of the last mutation.
    pub last_update: i64,
    /// Document format version.
    pub version: String,
    /// Session status marker (`active` while a writer is alive).
    pub status: String,
}

impl GlobalDocument {
    /// Fresh document with an empty command history.
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
            last_update: now_ms(),
            version: DOCUMENT_VERSION.into(),
            status: "active".into(),
        }
    }

    /// Append a command, trimming the history to [`COMMAND_DOCUMENT_CAP`] and
    /// advancing `lastUpdate`.
    pub fn append(&mut self, command: Command) {
        self.commands.push(command);
        if self.commands.len() > COMMAND_DOCUMENT_CAP {
            let excess = self.commands.len() - COMMAND_DOCUMENT_CAP;
            self.commands.drain(..excess);
        }
        self.last_update = now_ms();
    }
}

impl Default for GlobalDocument {
    fn default() -> Self {
        Self::new()
    }
}

/// Session document written to the realtime database on startup. The poller
/// touches `lastPoll` on every read, which is how we detect it is connected.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDocument {
    /// Milliseconds since epoch when the session was created.
    pub created: i64,
    /// Session status marker.
    pub status: String,
    /// Last time the poller read the session, if it ever did.
    #[serde(default)]
    pub last_poll: Option<i64>,
}

impl SessionDocument {
    /// New active session stamped with the current time.
    pub fn active() -> Self {
        Self {
            created: now_ms(),
            status: "active".into(),
            last_poll: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::command::Command;

    fn command(id: &str) -> Command {
        Command {
            id: id.into(),
            action: "live".into(),
            page: 1,
            row: 1,
            col: 1,
            timestamp: now_ms(),
            executed: false,
        }
    }

    #[test]
    fn append_caps_history_at_fifty_dropping_oldest() {
        let mut doc = GlobalDocument::new();
        for i in 0..51 {
            doc.append(command(&format!("cmd-{i}")));
        }
        assert_eq!(doc.commands.len(), COMMAND_DOCUMENT_CAP);
        assert_eq!(doc.commands.first().unwrap().id, "cmd-1");
        assert_eq!(doc.commands.last().unwrap().id, "cmd-50");
    }

    #[test]
    fn append_advances_last_update() {
        let mut doc = GlobalDocument::new();
        doc.last_update = 0;
        doc.append(command("cmd"));
        assert!(doc.last_update > 0);
    }
}
