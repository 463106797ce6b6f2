//! Adapter for the companion's local HTTP API. Highest-priority network
//! transport when reachable; probed on a fixed interval to drive the
//! connected indicator.

use std::time::Duration;

use futures::future::BoxFuture;
use reqwest::{Client, StatusCode};

use crate::{
    dao::{
        adapter::PersistenceAdapter,
        storage::{StorageError, StorageResult},
    },
    dto::snapshot::Snapshot,
};

/// Upper bound on any single request so a slow companion cannot stall the
/// engine; past this the call counts as adapter failure and we fall back.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

const BACKEND: &str = "local-http";

/// Snapshot transport over the companion's `api/local-buttons` endpoint.
#[derive(Clone)]
pub struct LocalHttpAdapter {
    client: Client,
    endpoint: String,
}

impl LocalHttpAdapter {
    /// Adapter targeting `endpoint` (e.g. `http://127.0.0.1:2828/api/local-buttons`).
    pub fn new(endpoint: impl Into<String>) -> StorageResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| StorageError::unavailable("building http client", err))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

impl PersistenceAdapter for LocalHttpAdapter {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>> {
        let adapter = self.clone();
        Box::pin(async move {
            let response = adapter
                .client
                .post(&adapter.endpoint)
                .json(&snapshot)
                .send()
                .await
                .map_err(|err| {
                    StorageError::unavailable(format!("POST {}", adapter.endpoint), err)
                })?;

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

    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>> {
        let adapter = self.clone();
        Box::pin(async move {
            let response = adapter
                .client
                .get(&adapter.endpoint)
                .send()
                .await
                .map_err(|err| {
                    StorageError::unavailable(format!("GET {}", adapter.endpoint), err)
                })?;

            match response.status() {
                StatusCode::NOT_FOUND => Ok(None),
                status if status.is_success() => response
                    .json::<Snapshot>()
                    .await
                    .map(Some)
                    .map_err(|err| {
                        StorageError::corrupt(format!("decoding {}", adapter.endpoint), err)
                    }),
                status => Err(StorageError::Rejected {
                    backend: BACKEND,
                    status: status.as_u16(),
                }),
            }
        })
    }

    fn probe(&self) -> BoxFuture<'static, StorageResult<()>> {
        let adapter = self.clone();
        Box::pin(async move {
            let response = adapter
                .client
                .get(&adapter.endpoint)
                .send()
                .await
                .map_err(|err| {
                    StorageError::unavailable(format!("GET {}", adapter.endpoint), err)
                })?;

            if response.status().is_success() || response.status() == StatusCode::NOT_FOUND {
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
