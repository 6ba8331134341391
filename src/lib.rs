#![deny(missing_docs)]

//! Core library for the docinsight batch document analysis server.

/// HTTP routing and REST handlers.
pub mod api;
/// Environment-driven configuration management.
pub mod config;
/// Generative model client abstraction and the Gemini adapter.
pub mod generation;
/// Structured logging and tracing setup.
pub mod logging;
/// Batch analysis metrics helpers.
pub mod metrics;
/// Format-specific upload parsers.
pub mod parsing;
/// Chunking, analysis, and batch orchestration.
pub mod processing;
