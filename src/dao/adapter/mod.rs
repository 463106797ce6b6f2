//! Polymorphic persistence adapters that push/pull button snapshots over one
//! external transport each.

/// JSON file store, the always-available local mirror.
pub mod file_store;
/// Local companion HTTP endpoint.
pub mod local_http;
#[cfg(feature = "realtime-store")]
/// Realtime database REST backend.
pub mod realtime_db;
#[cfg(feature = "snippet-store")]
/// Snippet-hosting API repurposed as a shared document store.
pub mod snippet;

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{dao::storage::StorageResult, dto::snapshot::Snapshot};

use self::file_store::FileStore;
#[cfg(feature = "realtime-store")]
use self::realtime_db::RealtimeDbAdapter;
#[cfg(feature = "snippet-store")]
use self::snippet::SnippetAdapter;

/// Abstraction over one snapshot transport. Adapters move bytes only; snapshot
/// semantics belong to the sync engine, and no adapter may assume another
/// adapter's data is visible to it.
pub trait PersistenceAdapter: Send + Sync {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
    /// Push a snapshot; failure is recoverable and the caller falls back.
    fn save(&self, snapshot: Snapshot) -> BoxFuture<'static, StorageResult<()>>;
    /// Pull the last snapshot; `None` when no prior snapshot exists.
    fn load(&self) -> BoxFuture<'static, StorageResult<Option<Snapshot>>>;
    /// Cheap reachability check driving the connected indicator.
    fn probe(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// The adapter wiring for one controller instance: an always-on local mirror
/// plus network transports in fixed priority order.
pub struct AdapterSet {
    /// Durable local mirror, written unconditionally on every save.
    pub mirror: Arc<FileStore>,
    /// Network transports, highest trust first.
    pub network: Vec<Arc<dyn PersistenceAdapter>>,
    /// Direct handle to the realtime backend for poller detection.
    #[cfg(feature = "realtime-store")]
    pub realtime: Option<Arc<RealtimeDbAdapter>>,
    /// Direct handle to the snippet backend for command relaying.
    #[cfg(feature = "snippet-store")]
    pub snippet: Option<Arc<SnippetAdapter>>,
}

impl AdapterSet {
    /// Adapter set with only the local mirror configured.
    pub fn mirror_only(mirror: Arc<FileStore>) -> Self {
        Self {
            mirror,
            network: Vec::new(),
            #[cfg(feature = "realtime-store")]
            realtime: None,
            #[cfg(feature = "snippet-store")]
            snippet: None,
        }
    }

    /// Highest-priority network transport, when any is configured.
    pub fn primary_network(&self) -> Option<&Arc<dyn PersistenceAdapter>> {
        self.network.first()
    }
}
