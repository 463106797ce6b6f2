//! Wire types shared between routes, services, and adapters.

use std::time::SystemTime;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

/// Operator-facing button DTOs.
pub mod buttons;
/// Relayed command types.
pub mod command;
/// SSE payloads.
pub mod events;
/// Health check payload.
pub mod health;
/// Polled snapshot schema.
pub mod snapshot;

/// Render a system time as an RFC 3339 string for log entries.
pub fn format_timestamp(time: SystemTime) -> String {
    OffsetDateTime::from(time)
        .format(&Rfc3339)
        .unwrap_or_else(|_| "invalid-timestamp".into())
}
