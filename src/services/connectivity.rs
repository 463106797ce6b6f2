//! Connectivity probing. A fixed-interval probe against the priority transport
//! drives the connected indicator, and the realtime session's `lastPoll` field
//! reveals when the poller first shows up.

use tokio::time::sleep;
use tracing::debug;

use crate::{
    dao::adapter::PersistenceAdapter,
    dto::events::{ConnectivityEvent, ServerEvent},
    state::{SharedState, event_log::Severity},
};

/// Probe the priority transport on a fixed interval and flip the connected
/// indicator on change. Falls back to probing the local mirror when no network
/// transport is configured, so the indicator still reflects something real.
pub async fn run_probe(state: SharedState) {
    let interval = state.config().probe_interval;
    loop {
        sleep(interval).await;

        let probed = match state.adapters().primary_network() {
            Some(adapter) => adapter.probe().await,
            None => state.adapters().mirror.probe().await,
        };

        let connected = probed.is_ok();
        if state.set_connected(connected) {
            announce_connectivity(&state, connected).await;
        }
    }
}

async fn announce_connectivity(state: &SharedState, connected: bool) {
    let (message, severity) = if connected {
        ("Upstream connection established", Severity::Success)
    } else {
        ("Upstream connection lost, operating offline", Severity::Warning)
    };
    state.log_event(message, severity).await;

    if let Ok(event) = ServerEvent::json(
        Some("connectivity".to_string()),
        &ConnectivityEvent { connected },
    ) {
        state.events().broadcast(event);
    }
}

/// Watch the realtime session for the poller's first read. The poller touches
/// `lastPoll` every time it consumes the session, so the first observed value
/// means the GSI companion is alive.
#[cfg(feature = "realtime-store")]
pub async fn watch_poller(state: SharedState) {
    use crate::dto::events::PollerEvent;

    let Some(realtime) = state.adapters().realtime.clone() else {
        return;
    };

    let interval = state.config().probe_interval;
    let mut seen: Option<i64> = None;
    loop {
        sleep(interval).await;

        match realtime.last_poll().await {
            Ok(Some(last_poll)) => {
                let first_sighting = seen.is_none();
                if seen != Some(last_poll) {
                    seen = Some(last_poll);
                    if first_sighting {
                        state
                            .log_event("GSI companion connected", Severity::Success)
                            .await;
                    }
                    if let Ok(event) = ServerEvent::json(
                        Some("poller".to_string()),
                        &PollerEvent { last_poll },
                    ) {
                        state.events().broadcast(event);
                    }
                }
            }
            Ok(None) => {}
            Err(err) => debug!(error = %err, "poller watch probe failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        dao::adapter::{AdapterSet, file_store::FileStore},
        state::AppState,
    };

    #[tokio::test]
    async fn connectivity_flip_logs_and_broadcasts() {
        let dir = std::env::temp_dir().join(format!("cs2-relay-conn-{}", uuid::Uuid::new_v4()));
        let state = AppState::new(
            AppConfig::default(),
            "cs2-test".into(),
            AdapterSet::mirror_only(FileStore::new(dir)),
        );

        let mut events = state.events().subscribe();
        assert!(state.set_connected(true));
        announce_connectivity(&state, true).await;

        // Log entry first, connectivity event second.
        let log = events.recv().await.unwrap();
        assert_eq!(log.event.as_deref(), Some("log"));
        let event = events.recv().await.unwrap();
        assert_eq!(event.event.as_deref(), Some("connectivity"));
        assert!(event.data.contains("true"));

        // No change means no second announcement.
        assert!(!state.set_connected(true));
    }
}
