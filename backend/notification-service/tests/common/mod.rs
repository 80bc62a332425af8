//! In-memory store and sender fakes for integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use notification_service::error::{AppError, Result};
use notification_service::models::{
    DeviceToken, Goal, NotificationChannel, NotificationPreferences, NotificationPriority,
    NotificationRecord, NotificationRequest, NotificationStatus, NotificationType, User,
};
use notification_service::services::channels::{ChannelSender, DeliveryOutcome};
use notification_service::store::{
    GoalStore, NotificationStore, PreferenceStore, SavingsStore, UserStore,
};

#[derive(Default)]
pub struct InMemoryNotificationStore {
    records: Mutex<HashMap<Uuid, NotificationRecord>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Uuid) -> Option<NotificationRecord> {
        self.records.lock().unwrap().get(&id).cloned()
    }

    pub fn put(&self, record: NotificationRecord) {
        self.records.lock().unwrap().insert(record.id, record);
    }

    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(&self, record: &NotificationRecord) -> Result<()> {
        self.records
            .lock()
            .unwrap()
            .insert(record.id, record.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>> {
        Ok(self.records.lock().unwrap().get(&id).cloned())
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>> {
        let mut records: Vec<NotificationRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let offset = ((page.max(1) - 1) * limit) as usize;
        Ok(records
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| {
                r.user_id == user_id && r.channel_state.in_app_sent && !r.channel_state.is_read
            })
            .count() as i64)
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool> {
        let mut records = self.records.lock().unwrap();
        match records.get_mut(&id) {
            Some(record) if !record.channel_state.is_read => {
                record.channel_state.is_read = true;
                record.channel_state.read_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let mut updated = 0;
        for record in self.records.lock().unwrap().values_mut() {
            if record.user_id == user_id
                && record.channel_state.in_app_sent
                && !record.channel_state.is_read
            {
                record.channel_state.is_read = true;
                record.channel_state.read_at = Some(Utc::now());
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn mark_channel_sent(
        &self,
        id: Uuid,
        channel: NotificationChannel,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("notification {} not found", id)))?;
        record.channel_state.mark_sent(channel, at);
        record.updated_at = at;
        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("notification {} not found", id)))?;
        record.status = status;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn due_for_sweep(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let mut due: Vec<NotificationRecord> = self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.status == NotificationStatus::Pending && r.scheduled_for <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn increment_retry(&self, id: Uuid) -> Result<i32> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("notification {} not found", id)))?;
        record.retry_count += 1;
        Ok(record.retry_count)
    }
}

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    prefs: Mutex<HashMap<Uuid, NotificationPreferences>>,
    tokens: Mutex<Vec<DeviceToken>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefs(prefs: NotificationPreferences) -> Self {
        let store = Self::default();
        store
            .prefs
            .lock()
            .unwrap()
            .insert(prefs.user_id, prefs);
        store
    }

    pub fn put(&self, prefs: NotificationPreferences) {
        self.prefs.lock().unwrap().insert(prefs.user_id, prefs);
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<NotificationPreferences>> {
        Ok(self.prefs.lock().unwrap().get(&user_id).cloned())
    }

    async fn upsert(&self, prefs: &NotificationPreferences) -> Result<()> {
        self.prefs
            .lock()
            .unwrap()
            .insert(prefs.user_id, prefs.clone());
        Ok(())
    }

    async fn active_device_tokens(&self, user_id: Uuid) -> Result<Vec<DeviceToken>> {
        Ok(self
            .tokens
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id && t.is_active)
            .cloned()
            .collect())
    }

    async fn register_device_token(
        &self,
        user_id: Uuid,
        token: &str,
        platform: &str,
    ) -> Result<Uuid> {
        let id = Uuid::new_v4();
        self.tokens.lock().unwrap().push(DeviceToken {
            id,
            user_id,
            token: token.to_string(),
            platform: platform.to_string(),
            is_active: true,
            last_used_at: None,
            created_at: Utc::now(),
        });
        Ok(id)
    }

    async fn remove_device_token(&self, user_id: Uuid, token: &str) -> Result<()> {
        self.tokens
            .lock()
            .unwrap()
            .retain(|t| !(t.user_id == user_id && t.token == token));
        Ok(())
    }

    async fn deactivate_device_token(&self, token_id: Uuid) -> Result<()> {
        for token in self.tokens.lock().unwrap().iter_mut() {
            if token.id == token_id {
                token.is_active = false;
            }
        }
        Ok(())
    }

    async fn touch_device_token(&self, token_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        for token in self.tokens.lock().unwrap().iter_mut() {
            if token.id == token_id {
                token.last_used_at = Some(at);
            }
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct StaticGoalStore {
    pub goals: Vec<Goal>,
}

#[async_trait]
impl GoalStore for StaticGoalStore {
    async fn find_active_nearing_deadline(&self, _threshold_days: i64) -> Result<Vec<Goal>> {
        Ok(self.goals.clone())
    }
}

#[derive(Default)]
pub struct StaticSavingsStore {
    pub totals: HashMap<Uuid, f64>,
}

#[async_trait]
impl SavingsStore for StaticSavingsStore {
    async fn total_for_user(&self, user_id: Uuid) -> Result<f64> {
        Ok(self.totals.get(&user_id).copied().unwrap_or(0.0))
    }
}

#[derive(Default)]
pub struct StaticUserStore {
    pub users: Vec<User>,
}

#[async_trait]
impl UserStore for StaticUserStore {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        Ok(self.users.iter().find(|u| u.id == user_id).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        Ok(self.users.clone())
    }
}

/// Channel sender that records calls and can be flipped into failure mode.
pub struct FakeSender {
    channel: NotificationChannel,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl FakeSender {
    pub fn new(channel: NotificationChannel) -> Self {
        Self {
            channel,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(channel: NotificationChannel) -> Self {
        let sender = Self::new(channel);
        sender.fail.store(true, Ordering::SeqCst);
        sender
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChannelSender for FakeSender {
    fn channel(&self) -> NotificationChannel {
        self.channel
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        _preferences: &NotificationPreferences,
    ) -> Result<DeliveryOutcome> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(AppError::ChannelDelivery {
                channel: self.channel.as_str(),
                reason: "transport down".to_string(),
            });
        }
        Ok(DeliveryOutcome::single(
            self.channel,
            record.user_id.to_string(),
        ))
    }
}

pub fn request_for(user_id: Uuid, channels: Vec<NotificationChannel>) -> NotificationRequest {
    NotificationRequest {
        user_id,
        notification_type: NotificationType::BudgetAlert,
        title: "Budget alert".to_string(),
        message: "You have spent 90% of your dining budget.".to_string(),
        payload: None,
        channels,
        priority: NotificationPriority::Medium,
        scheduled_for: None,
        source: Some("test".to_string()),
        category: Some("budgets".to_string()),
    }
}
