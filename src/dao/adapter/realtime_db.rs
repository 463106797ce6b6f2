//! Realtime database backend over its REST surface. Besides request/response
//! save and load, the session document's `lastPoll` field lets us observe the
//! poller touching the session, which drives the "poller connected" signal.

use std::{sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde_json::Value;

use crate::{
    dao::{
        adapter::PersistenceAdapter,
        models::SessionDocument,
        storage::{StorageError, StorageResult},
    },
    dto::{command::Command, snapshot::Snapshot},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const BACKEND: &str = "realtime-db";

/// Snapshot transport over a realtime database session subtree.
#[derive(Clone)]
pub struct RealtimeDbAdapter {
    client: Client,
    base_url: Arc<str>,
    session_id: Arc<str>,
}

impl RealtimeDbAdapter {
    /// Adapter rooted at `{base_url}/sessions/{session_id}`.
    pub fn new(base_url: &str, session_id: &str) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StorageError::unavailable("building http client", err))?;
        Ok(Self {
            client,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            session_id: Arc::from(session_id),
        })
    }

    fn node_url(&self, node: &str) -> String {
        format!(
            "{}/sessions/{}/{node}.json",
            self.base_url, self.session_id
        )
    }

    fn session_url(&self) -> String {
        format!("{}/sessions/{}.json", self.base_url, self.session_id)
    }

    async fn get_node(&self, node: &str) -> StorageResult<Option<Value>> {
        let url = self.node_url(node);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("GET {url}"), err))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let value = response
                    .json::<Value>()
                    .await
                    .map_err(|err| StorageError::corrupt(format!("decoding {url}"), err))?;
                // The REST surface answers `null` for absent nodes.
                Ok((!value.is_null()).then_some(value))
            }
            status => Err(StorageError::Rejected {
                backend: BACKEND,
                status: status.as_u16(),
            }),
        }
    }

    async fn put_node<T: serde::Serialize>(&self, node: &str, value: &T) -> StorageResult<()> {
        let url = self.node_url(node);
        let response = self
            .client
            .put(&url)
            .json(value)
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("PUT {url}"), err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Rejected {
                backend: BACKEND,
                status: response.status().as_u16(),
            })
        }
    }

    /// Create the session document unless one already exists. Written at the
    /// session root so `status` and `lastPoll` land on the nodes the probe
    /// and the poller watcher read back.
    pub async fn ensure_session(&self) -> StorageResult<()> {
        if self.get_node("status").await?.is_some() {
            return Ok(());
        }

        let url = self.session_url();
        let response = self
            .client
            .put(&url)
            .json(&SessionDocument::active())
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("PUT {url}"), err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Rejected {
                backend: BACKEND,
                status: response.status().as_u16(),
            })
        }
    }

    /// Mark the session closed (best effort, called on shutdown).
    pub async fn close_session(&self) -> StorageResult<()> {
        self.put_node("status", &"closed").await
    }

    /// Last time the poller read the session, if it ever did.
    pub async fn last_poll(&self) -> StorageResult<Option<i64>> {
        Ok(self
            .get_node("lastPoll")
            .await?
            .and_then(|value| value.as_i64()))
    }

    /// Append a command to the session's command list (push-style write).
    pub async fn push_command(&self, command: &Command) -> StorageResult<()> {
        let url = self.node_url("commands");
        let response = self
            .client
            .post(&url)
            .json(command)
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("POST {url}"), err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Rejected {
                backend: BACKEND,
                status: response.status().as_u16(),
            })
        }
    }
}

impl PersistenceAdapter for RealtimeDbAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>> {
        let adapter = self.clone();
        Box::pin(async move { adapter.put_node("buttons", &snapshot).await })
    }

    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>> {
        let adapter = self.clone();
        Box::pin(async move {
            match adapter.get_node("buttons").await? {
                Some(value) => serde_json::from_value::<Snapshot>(value)
                    .map(Some)
                    .map_err(|err| StorageError::corrupt("decoding session buttons", err)),
                None => Ok(None),
            }
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let adapter = self.clone();
        Box::pin(async move { adapter.get_node("status").await.map(|_| ()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_document_lands_on_the_nodes_read_back() {
        let adapter = RealtimeDbAdapter::new("https://db.example.com/", "cs2-abc").unwrap();
        assert_eq!(
            adapter.session_url(),
            "https://db.example.com/sessions/cs2-abc.json"
        );
        assert_eq!(
            adapter.node_url("lastPoll"),
            "https://db.example.com/sessions/cs2-abc/lastPoll.json"
        );

        // The document written at the session root must carry exactly the
        // field names `probe` and `last_poll` read as child nodes.
        let document = serde_json::to_value(SessionDocument::active()).unwrap();
        assert!(document.get("status").is_some());
        assert!(document.get("lastPoll").is_some());
        assert!(document.get("created").is_some());
    }
}
