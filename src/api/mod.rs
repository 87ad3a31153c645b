//! Trading backend REST client.

pub mod client;
pub mod errors;
pub mod models;

pub use client::TradingClient;
pub use errors::ApiError;
