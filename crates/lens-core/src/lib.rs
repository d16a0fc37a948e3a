//! # lens-core
//!
//! Core crate for the CryptoLens trading system, providing:
//!
//! - **Types** (`types`) — enums, market data structs, trading structs
//! - **Configuration** (`config`) — JSON config deserialization
//! - **Error types** (`error`) — domain-specific `LensError` via thiserror
//! - **Repositories** (`repository`) — capability traits for accounts,
//!   instruments, user-instrument links, and the trade log, plus in-memory
//!   implementations for wiring and tests
//! - **Market cache** (`cache`) — latest-snapshot + bounded-history store for
//!   tickers, order books, public trades, and spreads
//! - **Logging** (`logging`) — tracing-based structured logging

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod repository;
pub mod types;

// Re-export types at crate root for convenience.
pub use error::LensError;
pub use types::*;
