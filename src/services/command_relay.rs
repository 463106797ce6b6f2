//! The command relay: a shared, bounded command document that control
//! surfaces append to and the GSI companion polls. The document lives as a
//! plain file under the state directory so the poller-facing route serves
//! exactly what is on disk, and mirrors to the snippet backend when one is
//! configured.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::warn;

use crate::{
    dao::{
        models::GlobalDocument,
        storage::{StorageError, StorageResult},
    },
    dto::command::{Command, CommandAck, CommandSubmission},
    state::{SharedState, event_log::Severity},
};

#[cfg(feature = "snippet-store")]
use crate::dao::adapter::file_store::{COMMANDS_KEY, FALLBACK_COMMAND_CAP};

/// Location of the command document inside the state directory. Matches the
/// path segment of the polled route so a plain file server could stand in.
pub fn document_path(state_dir: &Path) -> PathBuf {
    state_dir.join("api").join("global.json")
}

/// Read the command document, initializing a fresh one on first access. A
/// corrupt document is discarded with a warning rather than wedging the relay.
pub async fn read_or_init(path: &Path) -> StorageResult<GlobalDocument> {
    match fs::read_to_string(path).await {
        Ok(contents) => match serde_json::from_str::<GlobalDocument>(&contents) {
            Ok(document) => Ok(document),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "corrupt command document; reinitializing");
                let document = GlobalDocument::new();
                write_document(path, &document).await?;
                Ok(document)
            }
        },
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let document = GlobalDocument::new();
            write_document(path, &document).await?;
            Ok(document)
        }
        Err(err) => Err(StorageError::unavailable(
            format!("reading {}", path.display()),
            err,
        )),
    }
}

async fn write_document(path: &Path, document: &GlobalDocument) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|err| {
            StorageError::unavailable(format!("creating {}", parent.display()), err)
        })?;
    }
    let contents = serde_json::to_string_pretty(document)
        .map_err(|err| StorageError::corrupt(format!("encoding {}", path.display()), err))?;
    fs::write(path, contents)
        .await
        .map_err(|err| StorageError::unavailable(format!("writing {}", path.display()), err))
}

/// The document as the poller sees it.
pub async fn fetch_document(state: &SharedState) -> StorageResult<GlobalDocument> {
    let path = document_path(&state.config().state_dir);
    read_or_init(&path).await
}

/// Append a submitted command to the shared document and relay it to the
/// remote backends. The local write is authoritative; remote failures degrade
/// to the bounded fallback queue and a logged warning.
pub async fn submit(
    state: &SharedState,
    submission: CommandSubmission,
) -> StorageResult<CommandAck> {
    let command = Command::from_submission(submission);

    let path = document_path(&state.config().state_dir);
    {
        // Serialize the read-modify-write so concurrent submissions cannot
        // drop each other's appends.
        let _guard = state.command_gate().lock().await;
        let mut document = read_or_init(&path).await?;
        document.append(command.clone());
        write_document(&path, &document).await?;
    }

    relay_remote(state, &command).await;

    state
        .log_event(
            format!("Command relayed: {}", command.action),
            Severity::Success,
        )
        .await;

    Ok(CommandAck {
        success: true,
        command,
    })
}

/// Best-effort fan-out of a freshly appended command to the remote backends.
#[allow(unused_variables)]
async fn relay_remote(state: &SharedState, command: &Command) {
    #[cfg(feature = "snippet-store")]
    if let Some(snippet) = &state.adapters().snippet {
        let path = document_path(&state.config().state_dir);
        let pushed = match read_or_init(&path).await {
            Ok(document) => snippet.push_commands(&document).await,
            Err(err) => Err(err),
        };
        if let Err(err) = pushed {
            warn!(error = %err, "snippet command push failed; queueing locally");
            queue_fallback(state, command).await;
            state
                .log_event(
                    "Remote command relay failed, command queued locally",
                    Severity::Warning,
                )
                .await;
        }
    }

    #[cfg(feature = "realtime-store")]
    if let Some(realtime) = &state.adapters().realtime {
        if let Err(err) = realtime.push_command(command).await {
            warn!(error = %err, "realtime command push failed");
        }
    }
}

/// Append to the bounded local fallback queue, dropping the oldest entries.
#[cfg(feature = "snippet-store")]
async fn queue_fallback(state: &SharedState, command: &Command) {
    let mirror = &state.adapters().mirror;
    let mut queue = match mirror.read_json::<Vec<Command>>(COMMANDS_KEY).await {
        Ok(Some(queue)) => queue,
        Ok(None) => Vec::new(),
        Err(err) => {
            warn!(error = %err, "fallback queue unreadable; starting fresh");
            Vec::new()
        }
    };

    queue.push(command.clone());
    if queue.len() > FALLBACK_COMMAND_CAP {
        let excess = queue.len() - FALLBACK_COMMAND_CAP;
        queue.drain(..excess);
    }

    if let Err(err) = mirror.write_json(COMMANDS_KEY, &queue).await {
        warn!(error = %err, "fallback queue write failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{COMMAND_DOCUMENT_CAP, DOCUMENT_VERSION};

    fn temp_dir() -> PathBuf {
        std::env::temp_dir().join(format!("cs2-relay-cmd-{}", uuid::Uuid::new_v4()))
    }

    fn submission(action: &str) -> CommandSubmission {
        CommandSubmission {
            action: action.into(),
            page: 1,
            row: 1,
            col: 1,
            id: None,
            timestamp: None,
        }
    }

    #[tokio::test]
    async fn first_read_initializes_fresh_document() {
        let path = document_path(&temp_dir());
        let document = read_or_init(&path).await.unwrap();
        assert!(document.commands.is_empty());
        assert_eq!(document.version, DOCUMENT_VERSION);
        assert_eq!(document.status, "active");

        // The initial document is persisted, not just returned.
        let reread = read_or_init(&path).await.unwrap();
        assert_eq!(reread.commands.len(), 0);
        assert_eq!(reread.last_update, document.last_update);
    }

    #[tokio::test]
    async fn corrupt_document_is_reinitialized() {
        let path = document_path(&temp_dir());
        fs::create_dir_all(path.parent().unwrap()).await.unwrap();
        fs::write(&path, b"{ not json").await.unwrap();

        let document = read_or_init(&path).await.unwrap();
        assert!(document.commands.is_empty());
    }

    #[cfg(feature = "snippet-store")]
    #[tokio::test]
    async fn fallback_queue_keeps_only_most_recent_twenty() {
        use crate::{
            config::AppConfig,
            dao::adapter::{AdapterSet, file_store::FileStore},
            state::AppState,
        };

        let mirror = FileStore::new(temp_dir());
        let state = AppState::new(
            AppConfig::default(),
            "cs2-test".into(),
            AdapterSet::mirror_only(mirror),
        );

        for i in 0..(FALLBACK_COMMAND_CAP + 5) {
            let command = Command::from_submission(submission(&format!("act-{i}")));
            queue_fallback(&state, &command).await;
        }

        let queue = state
            .adapters()
            .mirror
            .read_json::<Vec<Command>>(COMMANDS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(queue.len(), FALLBACK_COMMAND_CAP);
        assert_eq!(queue.first().unwrap().action, "act-5");
        assert_eq!(queue.last().unwrap().action, "act-24");
    }

    #[tokio::test]
    async fn appends_accumulate_and_cap() {
        let path = document_path(&temp_dir());
        let mut document = read_or_init(&path).await.unwrap();
        for i in 0..(COMMAND_DOCUMENT_CAP + 5) {
            document.append(Command::from_submission(submission(&format!("act-{i}"))));
        }
        write_document(&path, &document).await.unwrap();

        let reread = read_or_init(&path).await.unwrap();
        assert_eq!(reread.commands.len(), COMMAND_DOCUMENT_CAP);
        assert_eq!(reread.commands.first().unwrap().action, "act-5");
    }
}
