//! Stable Diffusion WebUI adapter.
//!
//! Provides a blocking REST client for the `/sdapi/v1` endpoints and
//! implements the grid's host traits (registry, settings, renderer) on top
//! of it, plus an async interrupt handle for signal handlers.

pub mod api;
pub mod host;

pub use api::{InterruptHandle, WebUiApi, WebUiError};
pub use host::WebUiHost;
