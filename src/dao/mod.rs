/// Persistence adapters for the interchangeable snapshot transports.
pub mod adapter;
/// Persisted document model definitions.
pub mod models;
/// Storage abstraction layer shared by every transport backend.
pub mod storage;
