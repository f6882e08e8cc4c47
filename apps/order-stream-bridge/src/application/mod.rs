//! Application Layer - Use cases and port definitions.
//!
//! Ports describe the broker transport and trading session the pipeline
//! depends on; services implement ingestion, fallback and execution relay on
//! top of them.

/// Port interfaces for the broker transport and trading session.
pub mod ports;

/// Order ingestion, consumption monitoring and execution relay services.
pub mod services;
