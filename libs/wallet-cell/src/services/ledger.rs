// libs/wallet-cell/src/services/ledger.rs
use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_utils::codes::round_money;

use crate::error::LedgerError;
use crate::models::{LedgerDirection, LedgerEntry, LedgerTransaction};

/// Call contract of the wallet ledger. Debits must fail rather than
/// take a balance below zero.
#[async_trait]
pub trait LedgerService: Send + Sync {
    async fn credit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError>;

    async fn debit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError>;

    async fn balance(&self, user_id: Uuid) -> Result<f64, LedgerError>;
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Uuid, f64>,
    history: Vec<LedgerTransaction>,
}

/// Process-local ledger used by the worker and by tests.
#[derive(Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an opening balance without recording a transaction.
    pub async fn seed(&self, user_id: Uuid, amount: f64) {
        let mut state = self.state.write().await;
        state.balances.insert(user_id, round_money(amount));
    }

    pub async fn history_for(&self, user_id: Uuid) -> Vec<LedgerTransaction> {
        let state = self.state.read().await;
        state
            .history
            .iter()
            .filter(|tx| tx.entry.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn history(&self) -> Vec<LedgerTransaction> {
        self.state.read().await.history.clone()
    }

    async fn apply(
        &self,
        direction: LedgerDirection,
        entry: LedgerEntry,
    ) -> Result<LedgerTransaction, LedgerError> {
        if !entry.amount.is_finite() || entry.amount <= 0.0 {
            return Err(LedgerError::InvalidAmount(entry.amount));
        }
        let amount = round_money(entry.amount);

        let mut state = self.state.write().await;
        let balance = state.balances.get(&entry.user_id).copied().unwrap_or(0.0);

        let balance_after = match direction {
            LedgerDirection::Credit => round_money(balance + amount),
            LedgerDirection::Debit => {
                if balance + f64::EPSILON < amount {
                    warn!(
                        "Rejecting debit of {:.2} from {}: balance {:.2}",
                        amount, entry.user_id, balance
                    );
                    return Err(LedgerError::InsufficientFunds {
                        user_id: entry.user_id,
                        balance,
                        requested: amount,
                    });
                }
                round_money(balance - amount)
            }
        };

        state.balances.insert(entry.user_id, balance_after);

        let transaction = LedgerTransaction {
            id: Uuid::new_v4(),
            direction,
            entry: LedgerEntry { amount, ..entry },
            balance_after,
            created_at: Utc::now(),
        };
        state.history.push(transaction.clone());

        info!(
            "Ledger {:?} {:.2} for {} ({}), balance now {:.2}",
            direction, amount, transaction.entry.user_id, transaction.entry.category, balance_after
        );
        Ok(transaction)
    }
}

#[async_trait]
impl LedgerService for InMemoryLedger {
    async fn credit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
        self.apply(LedgerDirection::Credit, entry).await
    }

    async fn debit(&self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
        self.apply(LedgerDirection::Debit, entry).await
    }

    async fn balance(&self, user_id: Uuid) -> Result<f64, LedgerError> {
        let balance = self
            .state
            .read()
            .await
            .balances
            .get(&user_id)
            .copied()
            .unwrap_or(0.0);
        debug!("Balance for {}: {:.2}", user_id, balance);
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LedgerCategory;

    fn entry(user_id: Uuid, amount: f64) -> LedgerEntry {
        LedgerEntry::new(user_id, amount, "test", None, LedgerCategory::Refund)
    }

    #[tokio::test]
    async fn test_credit_then_debit_tracks_balance() {
        let ledger = InMemoryLedger::new();
        let user = Uuid::new_v4();

        ledger.credit(entry(user, 400.0)).await.unwrap();
        let tx = ledger.debit(entry(user, 150.5)).await.unwrap();

        assert_eq!(tx.balance_after, 249.5);
        assert_eq!(ledger.balance(user).await.unwrap(), 249.5);
        assert_eq!(ledger.history_for(user).await.len(), 2);
    }

    #[tokio::test]
    async fn test_debit_underflow_fails_without_side_effects() {
        let ledger = InMemoryLedger::new();
        let user = Uuid::new_v4();
        ledger.seed(user, 10.0).await;

        let err = ledger.debit(entry(user, 10.01)).await.unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(ledger.balance(user).await.unwrap(), 10.0);
        assert!(ledger.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let ledger = InMemoryLedger::new();
        let err = ledger.credit(entry(Uuid::new_v4(), 0.0)).await.unwrap_err();
        assert_eq!(err, LedgerError::InvalidAmount(0.0));
    }
}
