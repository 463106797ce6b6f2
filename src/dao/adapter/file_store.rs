//! JSON file store under the state directory. Plays the role the browser's
//! localStorage played for the original pages: always available, zero network
//! cost, written as a mirror on every save so a later restart self-heals even
//! if the network adapter changes.

use std::{io::ErrorKind, path::PathBuf, sync::Arc};

use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde::{Serialize, de::DeserializeOwned};
use tokio::fs;

use crate::{
    dao::{
        adapter::PersistenceAdapter,
        storage::{StorageError, StorageResult},
    },
    dto::snapshot::{ButtonEntry, Snapshot},
    state::store::now_ms,
};

/// Key holding the mirrored button snapshot.
pub const BUTTONS_KEY: &str = "cs2-advanced-buttons";
/// Key holding the bounded fallback command queue.
pub const COMMANDS_KEY: &str = "cs2-global-commands";
/// Key holding the persisted session identifier.
pub const SESSION_KEY: &str = "cs2-session-id";

/// Cap for the fallback command queue kept when no remote backend accepts
/// commands.
pub const FALLBACK_COMMAND_CAP: usize = 20;

/// Snapshot document as the original pages persisted it: wrapped in a
/// `buttons` object, with bare button maps accepted for older writes.
#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct ButtonsDocument {
    buttons: IndexMap<String, ButtonEntry>,
    #[serde(default, rename = "lastUpdate")]
    last_update: Option<i64>,
}

/// Key-value JSON store rooted at one directory; each key is a file.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Store rooted at `dir`. The directory is created lazily on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Arc<Self> {
        Arc::new(Self { dir: dir.into() })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Read and decode one key; absent files are `None`, unreadable content is
    /// a corrupt-document error.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let path = self.path_for(key);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(StorageError::unavailable(
                    format!("reading {}", path.display()),
                    err,
                ));
            }
        };

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|err| StorageError::corrupt(format!("decoding {}", path.display()), err))
    }

    /// Serialize and write one key, creating the directory if needed.
    pub async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> StorageResult<()> {
        fs::create_dir_all(&self.dir).await.map_err(|err| {
            StorageError::unavailable(format!("creating {}", self.dir.display()), err)
        })?;

        let path = self.path_for(key);
        let contents = serde_json::to_string_pretty(value)
            .map_err(|err| StorageError::corrupt(format!("encoding {}", path.display()), err))?;
        fs::write(&path, contents)
            .await
            .map_err(|err| StorageError::unavailable(format!("writing {}", path.display()), err))
    }

    /// Delete one key; absent files are fine.
    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::unavailable(
                format!("removing {}", path.display()),
                err,
            )),
        }
    }
}

impl PersistenceAdapter for FileStore {
    fn name(&self) -> &'static str {
        "file-store"
    }

    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let document = ButtonsDocument {
                buttons: snapshot.buttons,
                last_update: Some(snapshot.last_update),
            };
            store.write_json(BUTTONS_KEY, &document).await
        })
    }

    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>> {
        let store = self.clone();
        Box::pin(async move {
            match store.read_json::<ButtonsDocument>(BUTTONS_KEY).await {
                Ok(Some(document)) => Ok(Some(Snapshot {
                    last_update: document.last_update.unwrap_or_else(now_ms),
                    buttons: document.buttons,
                })),
                Ok(None) => Ok(None),
                // Legacy writes stored the bare button map without the wrapper.
                Err(err) if err.is_corrupt() => {
                    match store
                        .read_json::<IndexMap<String, ButtonEntry>>(BUTTONS_KEY)
                        .await
                    {
                        Ok(Some(buttons)) => Ok(Some(Snapshot {
                            last_update: now_ms(),
                            buttons,
                        })),
                        _ => Err(err),
                    }
                }
                Err(err) => Err(err),
            }
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            fs::create_dir_all(&store.dir).await.map_err(|err| {
                StorageError::unavailable(format!("creating {}", store.dir.display()), err)
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::store::PulseState;

    fn temp_store() -> Arc<FileStore> {
        let dir = std::env::temp_dir().join(format!("cs2-relay-test-{}", uuid::Uuid::new_v4()));
        FileStore::new(dir)
    }

    fn sample_snapshot() -> Snapshot {
        let mut snapshot = Snapshot::empty(10_000);
        snapshot.buttons.insert(
            "bomb_planted".into(),
            ButtonEntry {
                state: PulseState::Idle,
                timestamp: 0,
                page: 1,
                row: 1,
                col: 1,
                label: "Bomb Planted".into(),
                icon: "fas fa-bomb".into(),
            },
        );
        snapshot
    }

    #[tokio::test]
    async fn load_absent_is_none_not_error() {
        let store = temp_store();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let store = temp_store();
        let snapshot = sample_snapshot();
        store.save(snapshot.clone()).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
    }

    #[tokio::test]
    async fn bare_button_map_is_accepted() {
        let store = temp_store();
        let snapshot = sample_snapshot();
        store.write_json(BUTTONS_KEY, &snapshot.buttons).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded.buttons, snapshot.buttons);
    }

    #[tokio::test]
    async fn corrupt_document_surfaces_as_corrupt() {
        let store = temp_store();
        store.write_json(BUTTONS_KEY, &"not a document").await.unwrap();

        let err = store.load().await.unwrap_err();
        assert!(err.is_corrupt());
    }

    #[tokio::test]
    async fn remove_absent_is_ok() {
        let store = temp_store();
        store.remove(COMMANDS_KEY).await.unwrap();
    }
}
