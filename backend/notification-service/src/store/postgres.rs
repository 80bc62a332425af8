//! sqlx-backed store implementations.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::models::{
    ChannelState, DeviceToken, Goal, NotificationChannel, NotificationPreferences,
    NotificationPriority, NotificationRecord, NotificationStatus, NotificationType, User,
};
use crate::store::{
    GoalStore, NotificationStore, PreferenceStore, SavingsStore, UserStore,
};

/// Notification record store over the `notifications` table.
#[derive(Clone)]
pub struct PgNotificationStore {
    pool: PgPool,
}

impl PgNotificationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_record(row: &PgRow) -> NotificationRecord {
    let type_str: String = row.get("notification_type");
    let priority_str: String = row.get("priority");
    let status_str: String = row.get("status");
    let channels: Vec<String> = row.get("channels");

    NotificationRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        notification_type: NotificationType::parse(&type_str),
        title: row.get("title"),
        message: row.get("message"),
        payload: row.get("payload"),
        channels: channels
            .iter()
            .filter_map(|c| NotificationChannel::parse(c))
            .collect(),
        channel_state: ChannelState {
            email_sent: row.get("email_sent"),
            email_sent_at: row.get("email_sent_at"),
            push_sent: row.get("push_sent"),
            push_sent_at: row.get("push_sent_at"),
            in_app_sent: row.get("in_app_sent"),
            in_app_sent_at: row.get("in_app_sent_at"),
            is_read: row.get("is_read"),
            read_at: row.get("read_at"),
        },
        priority: NotificationPriority::parse(&priority_str),
        status: NotificationStatus::parse(&status_str),
        scheduled_for: row.get("scheduled_for"),
        expires_at: row.get("expires_at"),
        retry_count: row.get("retry_count"),
        source: row.get("source"),
        category: row.get("category"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const RECORD_COLUMNS: &str = "id, user_id, notification_type, title, message, payload, channels, \
     email_sent, email_sent_at, push_sent, push_sent_at, in_app_sent, in_app_sent_at, \
     is_read, read_at, priority, status, scheduled_for, expires_at, retry_count, \
     source, category, created_at, updated_at";

#[async_trait]
impl NotificationStore for PgNotificationStore {
    async fn insert(&self, record: &NotificationRecord) -> Result<()> {
        let query = r#"
            INSERT INTO notifications (
                id, user_id, notification_type, title, message, payload, channels,
                email_sent, push_sent, in_app_sent, is_read,
                priority, status, scheduled_for, expires_at, retry_count,
                source, category, created_at, updated_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7,
                false, false, false, false,
                $8, $9, $10, $11, 0, $12, $13, $14, $14
            )
        "#;

        let channels: Vec<String> = record
            .channels
            .iter()
            .map(|c| c.as_str().to_string())
            .collect();

        sqlx::query(query)
            .bind(record.id)
            .bind(record.user_id)
            .bind(record.notification_type.as_str())
            .bind(&record.title)
            .bind(&record.message)
            .bind(&record.payload)
            .bind(&channels)
            .bind(record.priority.as_str())
            .bind(record.status.as_str())
            .bind(record.scheduled_for)
            .bind(record.expires_at)
            .bind(&record.source)
            .bind(&record.category)
            .bind(record.created_at)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<NotificationRecord>> {
        let query = format!("SELECT {RECORD_COLUMNS} FROM notifications WHERE id = $1");

        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_record))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        page: u32,
        limit: u32,
    ) -> Result<Vec<NotificationRecord>> {
        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM notifications \
             WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"
        );

        let rows = sqlx::query(&query)
            .bind(user_id)
            .bind(i64::from(limit))
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let query = r#"
            SELECT COUNT(*) AS count FROM notifications
            WHERE user_id = $1 AND in_app_sent = true AND is_read = false
        "#;

        let row = sqlx::query(query).bind(user_id).fetch_one(&self.pool).await?;
        Ok(row.get("count"))
    }

    async fn mark_read(&self, id: Uuid) -> Result<bool> {
        // The is_read guard makes the false -> true transition one-way and
        // read_at write-once.
        let query = r#"
            UPDATE notifications
            SET is_read = true, read_at = $1, updated_at = $1
            WHERE id = $2 AND is_read = false
        "#;

        let result = sqlx::query(query)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_read(&self, user_id: Uuid) -> Result<u64> {
        let query = r#"
            UPDATE notifications
            SET is_read = true, read_at = $1, updated_at = $1
            WHERE user_id = $2 AND in_app_sent = true AND is_read = false
        "#;

        let result = sqlx::query(query)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn mark_channel_sent(
        &self,
        id: Uuid,
        channel: NotificationChannel,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let query = match channel {
            NotificationChannel::Email => {
                "UPDATE notifications SET email_sent = true, email_sent_at = $1, updated_at = $1 WHERE id = $2"
            }
            NotificationChannel::Push => {
                "UPDATE notifications SET push_sent = true, push_sent_at = $1, updated_at = $1 WHERE id = $2"
            }
            NotificationChannel::InApp => {
                "UPDATE notifications SET in_app_sent = true, in_app_sent_at = $1, updated_at = $1 WHERE id = $2"
            }
        };

        sqlx::query(query)
            .bind(at)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_status(&self, id: Uuid, status: NotificationStatus) -> Result<()> {
        let query = r#"
            UPDATE notifications SET status = $1, updated_at = $2 WHERE id = $3
        "#;

        sqlx::query(query)
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn due_for_sweep(
        &self,
        now: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<NotificationRecord>> {
        let query = format!(
            "SELECT {RECORD_COLUMNS} FROM notifications \
             WHERE status = 'pending' AND scheduled_for <= $1 \
             ORDER BY scheduled_for ASC LIMIT $2"
        );

        let rows = sqlx::query(&query)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_record).collect())
    }

    async fn increment_retry(&self, id: Uuid) -> Result<i32> {
        let query = r#"
            UPDATE notifications
            SET retry_count = retry_count + 1, updated_at = $1
            WHERE id = $2
            RETURNING retry_count
        "#;

        let row = sqlx::query(query)
            .bind(Utc::now())
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("retry_count"))
    }
}

/// Preference store over `notification_preferences` and `device_tokens`.
#[derive(Clone)]
pub struct PgPreferenceStore {
    pool: PgPool,
}

impl PgPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_prefs(row: &PgRow) -> Result<NotificationPreferences> {
    let email: serde_json::Value = row.get("email_prefs");
    let push: serde_json::Value = row.get("push_prefs");
    let in_app: serde_json::Value = row.get("in_app_prefs");
    let quiet_hours: serde_json::Value = row.get("quiet_hours");

    Ok(NotificationPreferences {
        user_id: row.get("user_id"),
        email: serde_json::from_value(email)
            .map_err(|e| AppError::Internal(format!("corrupt email preferences: {e}")))?,
        push: serde_json::from_value(push)
            .map_err(|e| AppError::Internal(format!("corrupt push preferences: {e}")))?,
        in_app: serde_json::from_value(in_app)
            .map_err(|e| AppError::Internal(format!("corrupt in_app preferences: {e}")))?,
        quiet_hours: serde_json::from_value(quiet_hours)
            .map_err(|e| AppError::Internal(format!("corrupt quiet hours: {e}")))?,
        updated_at: row.get("updated_at"),
    })
}

fn row_to_device_token(row: &PgRow) -> DeviceToken {
    DeviceToken {
        id: row.get("id"),
        user_id: row.get("user_id"),
        token: row.get("token"),
        platform: row.get("platform"),
        is_active: row.get("is_active"),
        last_used_at: row.get("last_used_at"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl PreferenceStore for PgPreferenceStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<NotificationPreferences>> {
        let query = r#"
            SELECT user_id, email_prefs, push_prefs, in_app_prefs, quiet_hours, updated_at
            FROM notification_preferences
            WHERE user_id = $1
        "#;

        match sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?
        {
            Some(row) => Ok(Some(decode_prefs(&row)?)),
            None => Ok(None),
        }
    }

    async fn upsert(&self, prefs: &NotificationPreferences) -> Result<()> {
        let query = r#"
            INSERT INTO notification_preferences (
                user_id, email_prefs, push_prefs, in_app_prefs, quiet_hours, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE
            SET email_prefs = $2, push_prefs = $3, in_app_prefs = $4,
                quiet_hours = $5, updated_at = $6
        "#;

        let email = serde_json::to_value(&prefs.email)
            .map_err(|e| AppError::Internal(format!("encode email preferences: {e}")))?;
        let push = serde_json::to_value(&prefs.push)
            .map_err(|e| AppError::Internal(format!("encode push preferences: {e}")))?;
        let in_app = serde_json::to_value(&prefs.in_app)
            .map_err(|e| AppError::Internal(format!("encode in_app preferences: {e}")))?;
        let quiet_hours = serde_json::to_value(&prefs.quiet_hours)
            .map_err(|e| AppError::Internal(format!("encode quiet hours: {e}")))?;

        sqlx::query(query)
            .bind(prefs.user_id)
            .bind(email)
            .bind(push)
            .bind(in_app)
            .bind(quiet_hours)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn active_device_tokens(&self, user_id: Uuid) -> Result<Vec<DeviceToken>> {
        let query = r#"
            SELECT id, user_id, token, platform, is_active, last_used_at, created_at
            FROM device_tokens
            WHERE user_id = $1 AND is_active = true
        "#;

        let rows = sqlx::query(query)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(row_to_device_token).collect())
    }

    async fn register_device_token(
        &self,
        user_id: Uuid,
        token: &str,
        platform: &str,
    ) -> Result<Uuid> {
        let query = r#"
            INSERT INTO device_tokens (
                id, user_id, token, platform, is_active, last_used_at, created_at
            ) VALUES ($1, $2, $3, $4, true, $5, $5)
            ON CONFLICT (user_id, token) DO UPDATE
            SET is_active = true, platform = $4, last_used_at = $5
            RETURNING id
        "#;

        let row = sqlx::query(query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(token)
            .bind(platform)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("id"))
    }

    async fn remove_device_token(&self, user_id: Uuid, token: &str) -> Result<()> {
        let query = r#"
            UPDATE device_tokens
            SET is_active = false
            WHERE user_id = $1 AND token = $2
        "#;

        sqlx::query(query)
            .bind(user_id)
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn deactivate_device_token(&self, token_id: Uuid) -> Result<()> {
        let query = r#"
            UPDATE device_tokens SET is_active = false WHERE id = $1
        "#;

        sqlx::query(query).bind(token_id).execute(&self.pool).await?;
        Ok(())
    }

    async fn touch_device_token(&self, token_id: Uuid, at: DateTime<Utc>) -> Result<()> {
        let query = r#"
            UPDATE device_tokens SET last_used_at = $1 WHERE id = $2
        "#;

        sqlx::query(query)
            .bind(at)
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

/// Read-only view over the `goals` collaborator table.
#[derive(Clone)]
pub struct PgGoalStore {
    pool: PgPool,
}

impl PgGoalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GoalStore for PgGoalStore {
    async fn find_active_nearing_deadline(&self, threshold_days: i64) -> Result<Vec<Goal>> {
        let cutoff = Utc::now() + Duration::days(threshold_days);
        let query = r#"
            SELECT id, user_id, title, target_amount, current_amount, target_date
            FROM goals
            WHERE is_active = true
              AND target_date <= $1
              AND target_date >= $2
              AND current_amount < target_amount
        "#;

        let rows = sqlx::query(query)
            .bind(cutoff)
            .bind(Utc::now())
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .iter()
            .map(|row| Goal {
                id: row.get("id"),
                user_id: row.get("user_id"),
                title: row.get("title"),
                target_amount: row.get("target_amount"),
                current_amount: row.get("current_amount"),
                target_date: row.get("target_date"),
            })
            .collect())
    }
}

/// Read-only view over the `savings_entries` collaborator table.
#[derive(Clone)]
pub struct PgSavingsStore {
    pool: PgPool,
}

impl PgSavingsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SavingsStore for PgSavingsStore {
    async fn total_for_user(&self, user_id: Uuid) -> Result<f64> {
        let query = r#"
            SELECT COALESCE(SUM(amount), 0)::double precision AS total
            FROM savings_entries
            WHERE user_id = $1
        "#;

        let row = sqlx::query(query).bind(user_id).fetch_one(&self.pool).await?;
        Ok(row.get("total"))
    }
}

/// Read-only view over the `users` collaborator table.
#[derive(Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>> {
        let query = r#"
            SELECT id, email, name FROM users WHERE id = $1
        "#;

        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|row| User {
            id: row.get("id"),
            email: row.get("email"),
            name: row.get("name"),
        }))
    }

    async fn list_all(&self) -> Result<Vec<User>> {
        let query = r#"
            SELECT id, email, name FROM users ORDER BY created_at ASC
        "#;

        let rows = sqlx::query(query).fetch_all(&self.pool).await?;

        Ok(rows
            .iter()
            .map(|row| User {
                id: row.get("id"),
                email: row.get("email"),
                name: row.get("name"),
            })
            .collect())
    }
}
