//! Domain layer containing business entities and logic.
//!
//! # Architecture
//!
//! - [`entities`] - Core business data structures
//! - [`repositories`] - Data access trait definitions
//! - [`codec`] - Base62 id/short code codec
//! - [`click_event`] - Click telemetry message
//! - [`click_worker`] - Background click publishing worker
//!
//! # Click Processing Flow
//!
//! 1. The redirect handler resolves the link and answers immediately
//! 2. [`crate::application::services::ClickRecorder`] queues a [`click_event::ClickEvent`]
//! 3. [`click_worker::run_click_worker`] hands events to the telemetry publisher in order
//! 4. The publisher delivers them to the event channel, keyed by short code

pub mod click_event;
pub mod click_worker;
pub mod codec;
pub mod entities;
pub mod repositories;
