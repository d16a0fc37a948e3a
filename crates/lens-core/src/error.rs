//! Typed error definitions for the CryptoLens trading system.
//!
//! Provides [`LensError`] for domain-specific errors that are more informative
//! than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result`.
//!
//! The variants follow the failure taxonomy of the system: transport and
//! websocket errors are recoverable and drive reconnect paths; `Api` carries
//! the exchange's own error code and message verbatim and is never retried
//! automatically; `Auth` is fatal to a connection attempt; `NotFound` is the
//! repository miss case.

use thiserror::Error;

/// Domain-specific errors for the CryptoLens trading system.
#[derive(Debug, Error)]
pub enum LensError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// HTTP transport failure (timeout, connection refused, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// WebSocket connection, handshake, or communication error.
    #[error("websocket error: {0}")]
    WebSocket(String),

    /// WebSocket or REST authentication failure.
    #[error("auth error: {0}")]
    Auth(String),

    /// Non-zero exchange response code. The message is the exchange's
    /// `retMsg`, passed through verbatim.
    #[error("exchange error {code}: {message}")]
    Api { code: i64, message: String },

    /// Market data or API response parsing error.
    #[error("parse error: {0}")]
    Parse(String),

    /// Repository lookup miss (account, instrument, cache key).
    #[error("not found: {0}")]
    NotFound(String),

    /// Order placement, amendment, or cancellation error.
    #[error("trading error: {0}")]
    Trading(String),
}

impl LensError {
    /// True if this is an application-level exchange error (`retCode != 0`).
    pub fn is_api_error(&self) -> bool {
        matches!(self, LensError::Api { .. })
    }
}
