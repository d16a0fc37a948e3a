//! # lens-exchange
//!
//! Bybit v5 connectivity for the CryptoLens trading system:
//!
//! - **Signing** (`auth`) — HMAC-SHA256 request and WebSocket signatures
//! - **REST** (`rest`, `dto`) — signed client, one method per endpoint,
//!   typed responses decoded from the `{retCode, retMsg, result}` envelope
//! - **Capability trait** (`client`) — [`ExchangeClient`], so the strategy
//!   layer stays testable against a mock
//! - **WebSocket** (`ws`) — authenticated, auto-reconnecting stream client
//! - **Decode** (`messages`) — topic-driven frame decode into a tagged enum
//! - **Backpressure** (`stream`) — bounded market queue with a fill monitor
//! - **Instruments** (`instruments`) — periodic metadata refresh task

pub mod auth;
pub mod client;
pub mod dto;
pub mod instruments;
pub mod messages;
pub mod rest;
pub mod stream;
pub mod ws;

pub use client::ExchangeClient;
pub use messages::StreamMessage;
pub use rest::BybitClient;
pub use ws::{WsClient, WsConfig};
