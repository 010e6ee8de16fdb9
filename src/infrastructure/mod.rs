//! Infrastructure layer for external integrations.
//!
//! This layer implements interfaces defined by the domain layer, providing
//! concrete implementations for persistence and event delivery.
//!
//! # Modules
//!
//! - [`messaging`] - Event channel abstraction, Redis Streams and in-memory
//!   channels, and the click telemetry publisher
//! - [`persistence`] - Link store implementations

pub mod messaging;
pub mod persistence;
