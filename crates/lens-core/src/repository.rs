//! Repository capability traits and in-memory implementations.
//!
//! The engine consumes accounts, instruments, user-instrument links, and the
//! trade log only through these traits, so the hosting application can plug
//! in its own persistence while tests and the standalone runner use the
//! in-memory variants.

use std::sync::Arc;

use ahash::AHashMap;
use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::LensError;
use crate::types::{AccountCredentials, ExecutionUpdate, Instrument};

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Access to exchange account credentials.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// Active credentials for one user. `LensError::NotFound` when the user
    /// has no active account.
    async fn get_active_account(&self, user_id: &str) -> Result<AccountCredentials, LensError>;

    /// All active accounts (one private stream is opened per entry).
    async fn get_active_accounts(&self) -> Result<Vec<AccountCredentials>, LensError>;
}

/// Access to instrument metadata.
#[async_trait]
pub trait InstrumentRepository: Send + Sync {
    async fn get_by_symbol(&self, symbol: &str) -> Result<Instrument, LensError>;

    async fn exists(&self, symbol: &str) -> Result<bool, LensError>;

    /// Idempotent upsert keyed by symbol.
    async fn save_instruments(&self, instruments: Vec<Instrument>) -> Result<(), LensError>;
}

/// Access to per-user instrument activation.
#[async_trait]
pub trait UserInstrumentRepository: Send + Sync {
    /// Symbols the user currently has enabled.
    async fn get_active_instruments_by_user(&self, user_id: &str)
    -> Result<Vec<String>, LensError>;

    /// Distinct symbols enabled by any user (drives public subscriptions).
    async fn get_active_instruments(&self) -> Result<Vec<String>, LensError>;
}

/// Durable audit trail of fills. Write-only from the engine's perspective.
#[async_trait]
pub trait TradeLogRepository: Send + Sync {
    async fn save_execution(
        &self,
        user_id: &str,
        execution: &ExecutionUpdate,
    ) -> Result<(), LensError>;
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

/// In-memory [`AccountRepository`].
#[derive(Default)]
pub struct MemoryAccountRepository {
    accounts: RwLock<AHashMap<String, AccountCredentials>>,
}

impl MemoryAccountRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, account: AccountCredentials) {
        self.accounts
            .write()
            .await
            .insert(account.user_id.clone(), account);
    }
}

#[async_trait]
impl AccountRepository for MemoryAccountRepository {
    async fn get_active_account(&self, user_id: &str) -> Result<AccountCredentials, LensError> {
        self.accounts
            .read()
            .await
            .get(user_id)
            .filter(|a| a.is_active)
            .cloned()
            .ok_or_else(|| LensError::NotFound(format!("active account for user {user_id}")))
    }

    async fn get_active_accounts(&self) -> Result<Vec<AccountCredentials>, LensError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }
}

/// In-memory [`InstrumentRepository`].
#[derive(Default)]
pub struct MemoryInstrumentRepository {
    instruments: RwLock<AHashMap<String, Instrument>>,
}

impl MemoryInstrumentRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl InstrumentRepository for MemoryInstrumentRepository {
    async fn get_by_symbol(&self, symbol: &str) -> Result<Instrument, LensError> {
        self.instruments
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| LensError::NotFound(format!("instrument {symbol}")))
    }

    async fn exists(&self, symbol: &str) -> Result<bool, LensError> {
        Ok(self.instruments.read().await.contains_key(symbol))
    }

    async fn save_instruments(&self, instruments: Vec<Instrument>) -> Result<(), LensError> {
        let mut map = self.instruments.write().await;
        for instrument in instruments {
            map.insert(instrument.symbol.clone(), instrument);
        }
        Ok(())
    }
}

/// In-memory [`UserInstrumentRepository`].
#[derive(Default)]
pub struct MemoryUserInstrumentRepository {
    by_user: RwLock<AHashMap<String, Vec<String>>>,
}

impl MemoryUserInstrumentRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Replace the active symbol list for a user.
    pub async fn set_active(&self, user_id: &str, symbols: Vec<String>) {
        self.by_user
            .write()
            .await
            .insert(user_id.to_string(), symbols);
    }
}

#[async_trait]
impl UserInstrumentRepository for MemoryUserInstrumentRepository {
    async fn get_active_instruments_by_user(
        &self,
        user_id: &str,
    ) -> Result<Vec<String>, LensError> {
        Ok(self
            .by_user
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn get_active_instruments(&self) -> Result<Vec<String>, LensError> {
        let map = self.by_user.read().await;
        let mut symbols: Vec<String> = map.values().flatten().cloned().collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }
}

/// In-memory [`TradeLogRepository`] that retains saved executions for
/// inspection.
#[derive(Default)]
pub struct MemoryTradeLogRepository {
    entries: RwLock<Vec<(String, ExecutionUpdate)>>,
}

impl MemoryTradeLogRepository {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn executions(&self) -> Vec<(String, ExecutionUpdate)> {
        self.entries.read().await.clone()
    }
}

#[async_trait]
impl TradeLogRepository for MemoryTradeLogRepository {
    async fn save_execution(
        &self,
        user_id: &str,
        execution: &ExecutionUpdate,
    ) -> Result<(), LensError> {
        self.entries
            .write()
            .await
            .push((user_id.to_string(), execution.clone()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(user: &str, active: bool) -> AccountCredentials {
        AccountCredentials {
            user_id: user.to_string(),
            api_key: "key".into(),
            api_secret: "secret".into(),
            account_type: "UNIFIED".into(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn inactive_accounts_are_invisible() {
        let repo = MemoryAccountRepository::new();
        repo.insert(account("alice", true)).await;
        repo.insert(account("bob", false)).await;

        assert!(repo.get_active_account("alice").await.is_ok());
        assert!(matches!(
            repo.get_active_account("bob").await,
            Err(LensError::NotFound(_))
        ));
        assert_eq!(repo.get_active_accounts().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn global_instruments_deduplicate_across_users() {
        let repo = MemoryUserInstrumentRepository::new();
        repo.set_active("alice", vec!["BTCUSDT".into(), "ETHUSDT".into()])
            .await;
        repo.set_active("bob", vec!["BTCUSDT".into()]).await;

        let all = repo.get_active_instruments().await.unwrap();
        assert_eq!(all, vec!["BTCUSDT".to_string(), "ETHUSDT".to_string()]);
    }
}
