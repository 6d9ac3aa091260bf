//! Web framework glue.
//!
//! - `axum` (requires the `axum-integration` feature): SSE responses, error
//!   mapping, request metadata

#[cfg(feature = "axum-integration")]
pub mod axum;
