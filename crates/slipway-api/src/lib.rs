//! Control-plane API server for Slipway.
//!
//! Two bearer-credential schemes gate the surface: account tokens for the
//! management endpoints, runner tokens for the poll/claim/report endpoints.

pub mod config;
pub mod error;
pub mod extract;
pub mod routes;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;
