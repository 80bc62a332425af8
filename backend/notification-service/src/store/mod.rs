//! Persistence seams for the dispatcher and scheduler.
//!
//! The dispatcher and scheduler are constructed against these traits rather
//! than concrete pools so tests can substitute in-memory fakes.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    DeviceToken, Goal, NotificationChannel, NotificationPreferences, NotificationRecord,
    NotificationStatus, User,
};

pub use postgres::{
    PgGoalStore, PgNotificationStore, PgPreferenceStore, PgSavingsStore, PgUserStore,
};

/// Durable store of notification records with per-channel sent/read state.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(&self, record: &NotificationRecord) -> Result<()>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>>;

    /// Newest-first page of a user's notifications.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>>;

    /// Count of records where the in-app channel was sent but not read.
    async fn unread_count(&self, user_id: Uuid) -> Result<i64>;

    /// Returns false when the record was already read or does not exist;
    /// read_at is written exactly once.
    async fn mark_read(&self, id: Uuid) -> Result<bool>;

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64>;

    /// Field-level update of one channel's sent flag and timestamp.
    async fn mark_channel_sent(
        &self,
        id: Uuid,
        channel: NotificationChannel,
        at: DateTime<Utc>,
    ) -> Result<()>;

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<()>;

    /// Pending records due at `now`, oldest scheduled first, bounded by `limit`.
    async fn due_for_sweep(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>>;

    /// Increments the sweep attempt counter, returning the new value.
    async fn increment_retry(&self, id: Uuid) -> Result<i32>;
}

/// Per-user channel/quiet-hours preferences and device tokens.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<NotificationPreferences>>;

    async fn upsert(&self, prefs: &NotificationPreferences) -> Result<()>;

    async fn active_device_tokens(&self, user_id: Uuid) -> Result<Vec<DeviceToken>>;

    async fn register_device_token(
        &self,
        user_id: Uuid,
        token: &str,
        platform: &str,
    ) -> Result<Uuid>;

    async fn remove_device_token(&self, user_id: Uuid, token: &str) -> Result<()>;

    /// Single-row field update so overlapping push sends for the same user
    /// cannot lose each other's writes.
    async fn deactivate_device_token(&self, token_id: Uuid) -> Result<()>;

    async fn touch_device_token(&self, token_id: Uuid, at: DateTime<Utc>) -> Result<()>;
}

/// Read-side of the goals collaborator.
#[async_trait]
pub trait GoalStore: Send + Sync {
    /// Active goals whose target date is within `threshold_days` and whose
    /// target amount has not been reached.
    async fn find_active_nearing_deadline(&self, threshold_days: i64) -> Result<Vec<Goal>>;
}

/// Read-side of the savings collaborator.
#[async_trait]
pub trait SavingsStore: Send + Sync {
    async fn total_for_user(&self, user_id: Uuid) -> Result<f64>;
}

/// Read-side of the users collaborator, for batch cadence jobs.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>>;

    async fn list_all(&self) -> Result<Vec<User>>;
}
