//! Payloads carried over the SSE stream.

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Clone, Debug)]
/// Dispatched payload carried across the SSE channel.
pub struct ServerEvent {
    /// Optional SSE event name.
    pub event: Option<String>,
    /// Serialized data field.
    pub data: String,
}

impl ServerEvent {
    /// Convenience wrapper that serialises `payload` into the SSE data field.
    pub fn json<E, T>(event: E, payload: &T) -> serde_json::Result<Self>
    where
        E: Into<Option<String>>,
        T: Serialize,
    {
        Ok(Self {
            event: event.into(),
            data: serde_json::to_string(payload)?,
        })
    }
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast whenever the connected/disconnected indicator flips.
pub struct ConnectivityEvent {
    /// Whether the priority network transport is reachable.
    pub connected: bool,
}

#[derive(Debug, Serialize, ToSchema)]
/// Broadcast when the poller is first observed touching the session.
pub struct PollerEvent {
    /// Milliseconds since epoch of the poller's last read.
    pub last_poll: i64,
}
