//! Snippet-hosting API (gist-style) repurposed as a shared document store.
//! Updates are a full PATCH of the document body; when the target document
//! does not exist (or the update is rejected) the adapter attempts a single
//! create-then-retry before giving up and letting the caller fall back.

use std::{collections::HashMap, sync::Arc, time::Duration};

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::{
    dao::{
        adapter::PersistenceAdapter,
        models::GlobalDocument,
        storage::{StorageError, StorageResult},
    },
    dto::snapshot::Snapshot,
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const BACKEND: &str = "snippet-api";

/// File inside the snippet holding the button snapshot.
pub const SNAPSHOT_FILE: &str = "cs2-button-states.json";
/// File inside the snippet holding the relayed command document.
pub const COMMANDS_FILE: &str = "cs2-global-commands.json";

const DESCRIPTION: &str = "CS2 remote control shared state";

#[derive(Debug, Serialize)]
struct SnippetPayload {
    description: &'static str,
    public: bool,
    files: HashMap<String, SnippetFile>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnippetFile {
    content: String,
}

#[derive(Debug, Deserialize)]
struct SnippetResponse {
    id: String,
    #[serde(default)]
    files: HashMap<String, SnippetFile>,
}

/// Read-modify-write transport against a single shared snippet document.
#[derive(Clone)]
pub struct SnippetAdapter {
    client: Client,
    api_base: Arc<str>,
    token: Option<Arc<str>>,
    // Filled in lazily when the first create succeeds.
    gist_id: Arc<RwLock<Option<String>>>,
}

impl SnippetAdapter {
    /// Adapter against `api_base` (e.g. `https://api.github.com`), optionally
    /// targeting an existing snippet and authenticating with `token`.
    pub fn new(
        api_base: &str,
        gist_id: Option<String>,
        token: Option<String>,
    ) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("cs2-relay-back")
            .build()
            .map_err(|err| StorageError::unavailable("building http client", err))?;
        Ok(Self {
            client,
            api_base: Arc::from(api_base.trim_end_matches('/')),
            token: token.map(Arc::from),
            gist_id: Arc::new(RwLock::new(gist_id)),
        })
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self
            .client
            .request(method, url)
            .header("Accept", "application/vnd.github.v3+json");
        match &self.token {
            Some(token) => builder.bearer_auth(token.as_ref()),
            None => builder,
        }
    }

    fn payload(file: &str, content: String) -> SnippetPayload {
        let mut files = HashMap::new();
        files.insert(file.to_string(), SnippetFile { content });
        SnippetPayload {
            description: DESCRIPTION,
            public: true,
            files,
        }
    }

    async fn create(&self, payload: &SnippetPayload) -> StorageResult<String> {
        let url = format!("{}/gists", self.api_base);
        let response = self
            .request(Method::POST, url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("POST {url}"), err))?;

        if !response.status().is_success() {
            return Err(StorageError::Rejected {
                backend: BACKEND,
                status: response.status().as_u16(),
            });
        }

        let created = response
            .json::<SnippetResponse>()
            .await
            .map_err(|err| StorageError::corrupt("decoding snippet create response", err))?;
        Ok(created.id)
    }

    async fn patch(&self, id: &str, payload: &SnippetPayload) -> StorageResult<()> {
        let url = format!("{}/gists/{id}", self.api_base);
        let response = self
            .request(Method::PATCH, url.clone())
            .json(payload)
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("PATCH {url}"), err))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StorageError::Rejected {
                backend: BACKEND,
                status: response.status().as_u16(),
            })
        }
    }

    /// Replace one file of the shared document, creating the document when it
    /// does not exist yet or when the update is rejected.
    async fn put_file(&self, file: &str, content: String) -> StorageResult<()> {
        let payload = Self::payload(file, content);

        let existing = self.gist_id.read().await.clone();
        if let Some(id) = existing {
            match self.patch(&id, &payload).await {
                Ok(()) => return Ok(()),
                Err(StorageError::Rejected { .. }) => {
                    // Document vanished or was never ours: create a fresh one.
                }
                Err(err) => return Err(err),
            }
        }

        let id = self.create(&payload).await?;
        *self.gist_id.write().await = Some(id);
        Ok(())
    }

    async fn fetch_file(&self, file: &str) -> StorageResult<Option<String>> {
        let Some(id) = self.gist_id.read().await.clone() else {
            return Ok(None);
        };

        let url = format!("{}/gists/{id}", self.api_base);
        let response = self
            .request(Method::GET, url.clone())
            .send()
            .await
            .map_err(|err| StorageError::unavailable(format!("GET {url}"), err))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let snippet = response
                    .json::<SnippetResponse>()
                    .await
                    .map_err(|err| StorageError::corrupt("decoding snippet response", err))?;
                Ok(snippet.files.get(file).map(|f| f.content.clone()))
            }
            status => Err(StorageError::Rejected {
                backend: BACKEND,
                status: status.as_u16(),
            }),
        }
    }

    /// Push the relayed command document (already capped by the caller).
    pub async fn push_commands(&self, document: &GlobalDocument) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(document)
            .map_err(|err| StorageError::corrupt("encoding command document", err))?;
        self.put_file(COMMANDS_FILE, content).await
    }
}

impl PersistenceAdapter for SnippetAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>> {
        let adapter = self.clone();
        Box::pin(async move {
            let content = serde_json::to_string_pretty(&snapshot)
                .map_err(|err| StorageError::corrupt("encoding snapshot", err))?;
            adapter.put_file(SNAPSHOT_FILE, content).await
        })
    }

    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>> {
        let adapter = self.clone();
        Box::pin(async move {
            match adapter.fetch_file(SNAPSHOT_FILE).await? {
                Some(content) => serde_json::from_str::<Snapshot>(&content)
                    .map(Some)
                    .map_err(|err| StorageError::corrupt("decoding shared snapshot", err)),
                None => Ok(None),
            }
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let adapter = self.clone();
        Box::pin(async move {
            let id = adapter.gist_id.read().await.clone();
            let url = match id {
                Some(id) => format!("{}/gists/{id}", adapter.api_base),
                None => adapter.api_base.to_string(),
            };
            let response = adapter
                .request(Method::GET, url.clone())
                .send()
                .await
                .map_err(|err| StorageError::unavailable(format!("GET {url}"), err))?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(StorageError::Rejected {
                    backend: BACKEND,
                    status: response.status().as_u16(),
                })
            }
        })
    }
}
