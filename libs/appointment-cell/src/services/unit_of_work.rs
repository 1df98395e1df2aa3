use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;

use notification_cell::{ChatCollaborator, Notification, NotificationSink};
use shared_database::Transaction;
use wallet_cell::{LedgerCategory, LedgerDirection, LedgerEntry, LedgerError, LedgerService, LedgerTransaction};

/// A side effect produced inside a transaction and released after commit.
#[derive(Debug, Clone)]
pub enum SideEffect {
    Notify {
        user_id: Uuid,
        notification: Notification,
    },
    Broadcast {
        room: String,
        event: String,
        payload: Value,
    },
    SystemNotice {
        appointment_id: Uuid,
        text: String,
    },
}

#[derive(Debug, Default)]
pub struct Outbox {
    effects: Vec<SideEffect>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&mut self, user_id: Uuid, notification: Notification) {
        self.effects.push(SideEffect::Notify {
            user_id,
            notification,
        });
    }

    pub fn broadcast(&mut self, room: impl Into<String>, event: impl Into<String>, payload: Value) {
        self.effects.push(SideEffect::Broadcast {
            room: room.into(),
            event: event.into(),
            payload,
        });
    }

    pub fn system_notice(&mut self, appointment_id: Uuid, text: impl Into<String>) {
        self.effects.push(SideEffect::SystemNotice {
            appointment_id,
            text: text.into(),
        });
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Best-effort delivery; failures are logged and dropped.
    pub async fn dispatch(self, notifier: &dyn NotificationSink, chat: &dyn ChatCollaborator) {
        for effect in self.effects {
            let outcome = match &effect {
                SideEffect::Notify {
                    user_id,
                    notification,
                } => notifier.notify(*user_id, notification.clone()).await,
                SideEffect::Broadcast {
                    room,
                    event,
                    payload,
                } => notifier.broadcast_to_room(room, event, payload.clone()).await,
                SideEffect::SystemNotice {
                    appointment_id,
                    text,
                } => chat.post_system_notice(*appointment_id, text).await,
            };

            if let Err(e) = outcome {
                warn!("Dropping side effect {:?}: {}", effect, e);
            }
        }
    }
}

/// One orchestrator operation: the store transaction, the ledger calls made
/// so far, and the side effects waiting for commit.
pub struct UnitOfWork {
    tx: Transaction,
    ledger: Arc<dyn LedgerService>,
    journal: Vec<LedgerTransaction>,
    outbox: Outbox,
}

impl UnitOfWork {
    pub fn new(tx: Transaction, ledger: Arc<dyn LedgerService>) -> Self {
        Self {
            tx,
            ledger,
            journal: Vec::new(),
            outbox: Outbox::new(),
        }
    }

    pub fn tx(&self) -> &Transaction {
        &self.tx
    }

    pub fn tx_mut(&mut self) -> &mut Transaction {
        &mut self.tx
    }

    pub fn outbox(&mut self) -> &mut Outbox {
        &mut self.outbox
    }

    pub async fn credit(&mut self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
        let record = self.ledger.credit(entry).await?;
        self.journal.push(record.clone());
        Ok(record)
    }

    pub async fn debit(&mut self, entry: LedgerEntry) -> Result<LedgerTransaction, LedgerError> {
        let record = self.ledger.debit(entry).await?;
        self.journal.push(record.clone());
        Ok(record)
    }

    pub async fn balance(&self, user_id: Uuid) -> Result<f64, LedgerError> {
        self.ledger.balance(user_id).await
    }

    pub fn commit(self) -> Outbox {
        let UnitOfWork { tx, outbox, journal, .. } = self;
        debug!(
            "Committing transaction {} ({} ledger calls, {} side effects)",
            tx.id(),
            journal.len(),
            outbox.len()
        );
        tx.commit();
        outbox
    }

    /// Reverse journaled ledger calls newest first, then undo store writes.
    /// Queued side effects are discarded.
    pub async fn rollback(self) {
        let UnitOfWork {
            tx, ledger, journal, ..
        } = self;

        for record in journal.into_iter().rev() {
            let entry = LedgerEntry {
                memo: format!("Reversal of {}", record.id),
                category: LedgerCategory::Compensation,
                ..record.entry
            };
            let result = match record.direction.reversed() {
                LedgerDirection::Credit => ledger.credit(entry).await,
                LedgerDirection::Debit => ledger.debit(entry).await,
            };
            if let Err(e) = result {
                error!("Failed to compensate ledger transaction {}: {}", record.id, e);
            }
        }

        tx.rollback();
    }
}
