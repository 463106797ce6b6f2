/// Command document persistence and relaying.
pub mod command_relay;
/// Connectivity probing and poller detection.
pub mod connectivity;
/// OpenAPI documentation generation.
pub mod documentation;
/// Health check service.
pub mod health_service;
/// Server-Sent Events broadcasting service.
pub mod sse_service;
/// Snapshot load/save orchestration, pulses, and reconciliation.
pub mod sync_engine;
