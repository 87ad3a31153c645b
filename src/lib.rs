//! Library entrypoint for brokerage-qa-harness.
//!
//! Exposes all modules so integration tests can import them.

pub mod api;
pub mod auth;
pub mod config;
