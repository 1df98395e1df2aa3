use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::error::NotificationError;
use crate::models::SystemNotice;
use crate::services::realtime::{push_bounded, DEFAULT_HISTORY_LIMIT};

/// Inserts system-authored messages into an appointment's conversation.
#[async_trait]
pub trait ChatCollaborator: Send + Sync {
    async fn post_system_notice(&self, appointment_id: Uuid, text: &str) -> Result<(), NotificationError>;
}

pub struct InMemoryChatLog {
    notices: RwLock<VecDeque<SystemNotice>>,
    history_limit: usize,
}

impl Default for InMemoryChatLog {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryChatLog {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_HISTORY_LIMIT)
    }

    pub fn with_limit(history_limit: usize) -> Self {
        Self {
            notices: RwLock::new(VecDeque::new()),
            history_limit,
        }
    }

    pub async fn notices_for(&self, appointment_id: Uuid) -> Vec<SystemNotice> {
        self.notices
            .read()
            .await
            .iter()
            .filter(|notice| notice.appointment_id == appointment_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatCollaborator for InMemoryChatLog {
    async fn post_system_notice(&self, appointment_id: Uuid, text: &str) -> Result<(), NotificationError> {
        debug!("System notice for appointment {}: {}", appointment_id, text);
        let notice = SystemNotice {
            id: Uuid::new_v4(),
            appointment_id,
            text: text.to_string(),
            created_at: Utc::now(),
        };
        push_bounded(&mut *self.notices.write().await, notice, self.history_limit);
        Ok(())
    }
}
