//! CS2 relay backend binary entrypoint wiring REST, SSE, and persistence layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use rand::{Rng, distr::Alphanumeric};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod dao;
mod dto;
mod error;
mod routes;
mod services;
mod state;

use config::AppConfig;
use dao::adapter::{
    AdapterSet, PersistenceAdapter,
    file_store::{FileStore, SESSION_KEY},
    local_http::LocalHttpAdapter,
};
use state::{AppState, SharedState, store::now_ms};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();

    let mirror = FileStore::new(config.state_dir.clone());
    let session_id = resolve_session_id(&mirror).await;
    info!(session_id, "session identity resolved");

    let adapters = build_adapters(&config, Arc::clone(&mirror), &session_id).await;
    let app_state = AppState::new(config, session_id, adapters);

    services::sync_engine::initialize(&app_state).await;

    tokio::spawn(services::sync_engine::run_expiry_sweep(app_state.clone()));
    tokio::spawn(services::sync_engine::run_reconcile(app_state.clone()));
    tokio::spawn(services::connectivity::run_probe(app_state.clone()));
    #[cfg(feature = "realtime-store")]
    tokio::spawn(services::connectivity::watch_poller(app_state.clone()));

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state.clone());

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    close_session(&app_state).await;

    Ok(())
}

/// Wire up the persistence adapters in fixed priority order: the companion's
/// local endpoint first, then the realtime database, then the snippet API.
async fn build_adapters(config: &AppConfig, mirror: Arc<FileStore>, session_id: &str) -> AdapterSet {
    let mut adapters = AdapterSet::mirror_only(mirror);

    if let Some(endpoint) = &config.local_api_url {
        match LocalHttpAdapter::new(endpoint.clone()) {
            Ok(adapter) => adapters.network.push(Arc::new(adapter)),
            Err(err) => warn!(error = %err, "local http adapter disabled"),
        }
    }

    #[cfg(feature = "realtime-store")]
    if let Some(realtime) = &config.realtime {
        let session = realtime.session_id.as_deref().unwrap_or(session_id);
        match dao::adapter::realtime_db::RealtimeDbAdapter::new(&realtime.base_url, session) {
            Ok(adapter) => {
                let adapter = Arc::new(adapter);
                if let Err(err) = adapter.ensure_session().await {
                    warn!(error = %err, "could not create realtime session; continuing");
                }
                adapters.network.push(adapter.clone() as Arc<dyn PersistenceAdapter>);
                adapters.realtime = Some(adapter);
            }
            Err(err) => warn!(error = %err, "realtime adapter disabled"),
        }
    }
    #[cfg(not(feature = "realtime-store"))]
    let _ = session_id;

    #[cfg(feature = "snippet-store")]
    if let Some(snippet) = &config.snippet {
        match dao::adapter::snippet::SnippetAdapter::new(
            &snippet.api_base,
            snippet.gist_id.clone(),
            snippet.token.clone(),
        ) {
            Ok(adapter) => {
                let adapter = Arc::new(adapter);
                adapters.network.push(adapter.clone() as Arc<dyn PersistenceAdapter>);
                adapters.snippet = Some(adapter);
            }
            Err(err) => warn!(error = %err, "snippet adapter disabled"),
        }
    }

    adapters
}

/// Load the persisted session identifier, minting and storing a fresh one on
/// first launch.
async fn resolve_session_id(mirror: &FileStore) -> String {
    match mirror.read_json::<String>(SESSION_KEY).await {
        Ok(Some(id)) if !id.is_empty() => id,
        Ok(_) => {
            let id = generate_session_id();
            if let Err(err) = mirror.write_json(SESSION_KEY, &id).await {
                warn!(error = %err, "could not persist session id");
            }
            id
        }
        Err(err) => {
            warn!(error = %err, "session id unreadable; minting an ephemeral one");
            generate_session_id()
        }
    }
}

/// Session id in the shape the original control surfaces minted:
/// `cs2-<epoch millis in base 36>-<9 random lowercase alphanumerics>`.
fn generate_session_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "cs2-{}-{}",
        to_base36(now_ms()),
        suffix.to_lowercase()
    )
}

fn to_base36(mut value: i64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if value <= 0 {
        return "0".into();
    }
    let mut out = Vec::new();
    while value > 0 {
        out.push(DIGITS[(value % 36) as usize]);
        value /= 36;
    }
    out.reverse();
    String::from_utf8(out).unwrap_or_default()
}

/// Mark the realtime session closed on the way out, best effort.
#[allow(unused_variables)]
async fn close_session(state: &SharedState) {
    #[cfg(feature = "realtime-store")]
    if let Some(realtime) = &state.adapters().realtime {
        if let Err(err) = realtime.close_session().await {
            warn!(error = %err, "could not close realtime session");
        }
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state).layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut term = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = term.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ids_carry_the_expected_shape() {
        let id = generate_session_id();
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[0], "cs2");
        assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
        assert_eq!(parts[2].len(), 9);
        assert!(parts[2].chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn base36_round_trips_via_parse() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        let encoded = to_base36(1_700_000_000_000);
        assert_eq!(i64::from_str_radix(&encoded, 36).unwrap(), 1_700_000_000_000);
    }
}
