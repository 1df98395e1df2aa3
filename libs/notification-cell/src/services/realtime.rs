use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::NotificationError;
use crate::models::{Notification, RoomEvent, StoredNotification, UserPush};

pub type RealtimeSender = broadcast::Sender<String>;
pub type RealtimeReceiver = broadcast::Receiver<String>;

/// Persisted alerts plus best-effort realtime fan-out.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn notify(&self, user_id: Uuid, notification: Notification) -> Result<(), NotificationError>;

    async fn broadcast_to_room(
        &self,
        room: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), NotificationError>;
}

/// In-process implementation backed by tokio broadcast channels, one per
/// user and one per room, created lazily on first subscription.
pub struct RealtimeNotificationService {
    user_channels: Arc<RwLock<HashMap<Uuid, RealtimeSender>>>,
    room_channels: Arc<RwLock<HashMap<String, RealtimeSender>>>,
    alerts: RwLock<VecDeque<StoredNotification>>,
    room_history: RwLock<VecDeque<RoomEvent>>,
    channel_capacity: usize,
    history_limit: usize,
}

pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

/// Append to a bounded history, evicting the oldest entries first.
pub(crate) fn push_bounded<T>(history: &mut VecDeque<T>, item: T, limit: usize) {
    history.push_back(item);
    while history.len() > limit.max(1) {
        history.pop_front();
    }
}

impl Default for RealtimeNotificationService {
    fn default() -> Self {
        Self::new()
    }
}

impl RealtimeNotificationService {
    pub fn new() -> Self {
        Self::with_capacity(100)
    }

    pub fn with_capacity(channel_capacity: usize) -> Self {
        Self::with_limits(channel_capacity, DEFAULT_HISTORY_LIMIT)
    }

    /// `history_limit` bounds the stored alerts and room events separately.
    pub fn with_limits(channel_capacity: usize, history_limit: usize) -> Self {
        Self {
            user_channels: Arc::new(RwLock::new(HashMap::new())),
            room_channels: Arc::new(RwLock::new(HashMap::new())),
            alerts: RwLock::new(VecDeque::new()),
            room_history: RwLock::new(VecDeque::new()),
            channel_capacity,
            history_limit,
        }
    }

    pub async fn subscribe_user(&self, user_id: Uuid) -> RealtimeReceiver {
        let mut channels = self.user_channels.write().await;
        let sender = channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        debug!("Subscribed to user channel {}", user_id);
        sender.subscribe()
    }

    pub async fn subscribe_room(&self, room: &str) -> RealtimeReceiver {
        let mut channels = self.room_channels.write().await;
        let sender = channels
            .entry(room.to_string())
            .or_insert_with(|| broadcast::channel(self.channel_capacity).0);
        debug!("Subscribed to room {}", room);
        sender.subscribe()
    }

    pub async fn alerts_for(&self, user_id: Uuid) -> Vec<StoredNotification> {
        self.alerts
            .read()
            .await
            .iter()
            .filter(|alert| alert.user_id == user_id)
            .cloned()
            .collect()
    }

    pub async fn room_events(&self, room: &str) -> Vec<RoomEvent> {
        self.room_history
            .read()
            .await
            .iter()
            .filter(|event| event.room == room)
            .cloned()
            .collect()
    }

    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> bool {
        let mut alerts = self.alerts.write().await;
        match alerts
            .iter_mut()
            .find(|alert| alert.id == notification_id && alert.user_id == user_id)
        {
            Some(alert) => {
                alert.is_read = true;
                true
            }
            None => false,
        }
    }

    pub async fn get_active_rooms(&self) -> Vec<String> {
        self.room_channels.read().await.keys().cloned().collect()
    }

    fn send(sender: Option<&RealtimeSender>, target: &str, message: String) {
        match sender {
            Some(sender) => match sender.send(message) {
                Ok(receivers) => debug!("Pushed to {} ({} receivers)", target, receivers),
                Err(_) => debug!("No live receivers on {}", target),
            },
            None => debug!("No channel open for {}", target),
        }
    }
}

#[async_trait]
impl NotificationSink for RealtimeNotificationService {
    async fn notify(&self, user_id: Uuid, notification: Notification) -> Result<(), NotificationError> {
        let stored = StoredNotification {
            id: Uuid::new_v4(),
            user_id,
            notification: notification.clone(),
            is_read: false,
            created_at: Utc::now(),
        };
        push_bounded(&mut *self.alerts.write().await, stored, self.history_limit);

        let message = serde_json::to_string(&UserPush {
            user_id,
            notification,
        })?;
        let channels = self.user_channels.read().await;
        Self::send(channels.get(&user_id), &format!("user {}", user_id), message);

        info!("Notification stored for user {}", user_id);
        Ok(())
    }

    async fn broadcast_to_room(
        &self,
        room: &str,
        event: &str,
        payload: Value,
    ) -> Result<(), NotificationError> {
        let room_event = RoomEvent {
            room: room.to_string(),
            event: event.to_string(),
            payload,
            sent_at: Utc::now(),
        };
        let message = serde_json::to_string(&room_event)?;
        push_bounded(&mut *self.room_history.write().await, room_event, self.history_limit);

        let channels = self.room_channels.read().await;
        Self::send(channels.get(room), &format!("room {}", room), message);
        Ok(())
    }
}
