//! Helpers shared by the service and API layers.
//!
//! - [`short_code`] - Placeholder generation and custom code validation
//! - [`client_ip`] - Client metadata from HTTP headers
//! - [`db_error`] - Database error classification

pub mod client_ip;
pub mod db_error;
pub mod short_code;
