//! Application layer services.
//!
//! Services consume repository traits and the telemetry pipeline and give
//! HTTP handlers a small API.
//!
//! # Available Services
//!
//! - [`services::link_service::LinkService`] - Link creation and resolution
//! - [`services::click_recorder::ClickRecorder`] - Off-path click capture

pub mod services;
