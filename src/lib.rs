#![deny(missing_docs)]

//! Core library for the image labeling service.

/// HTTP routing and handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
mod endpoint;
/// User identity resolution.
pub mod identity;
/// Label detection client abstraction and adapters.
pub mod labels;
/// Structured logging and tracing setup.
pub mod logging;
/// Upload counters.
pub mod metrics;
/// Multipart body decoding.
pub mod multipart;
/// Upload orchestration across storage, labeling, and search.
pub mod pipeline;
/// Search index integration.
pub mod search;
/// Blob storage integration.
pub mod storage;
