use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Notification type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    /// A savings goal reached its target amount
    GoalAchieved,
    /// A goal is nearing its target date with insufficient progress
    GoalReminder,
    /// Cumulative savings crossed a milestone boundary
    SavingsMilestone,
    /// Spending exceeded a budget threshold
    BudgetAlert,
    /// A transaction was recorded on the account
    TransactionAlert,
    /// Daily logging reminder
    DailyReminder,
    /// Weekly savings summary
    WeeklySummary,
    /// Monthly spending summary
    MonthlySummary,
    /// Account settings changed
    AccountUpdate,
    /// Security-relevant event (new device, password change)
    SecurityAlert,
    /// System notification
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::GoalAchieved => "goal_achieved",
            NotificationType::GoalReminder => "goal_reminder",
            NotificationType::SavingsMilestone => "savings_milestone",
            NotificationType::BudgetAlert => "budget_alert",
            NotificationType::TransactionAlert => "transaction_alert",
            NotificationType::DailyReminder => "daily_reminder",
            NotificationType::WeeklySummary => "weekly_summary",
            NotificationType::MonthlySummary => "monthly_summary",
            NotificationType::AccountUpdate => "account_update",
            NotificationType::SecurityAlert => "security_alert",
            NotificationType::System => "system",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "goal_achieved" => NotificationType::GoalAchieved,
            "goal_reminder" => NotificationType::GoalReminder,
            "savings_milestone" => NotificationType::SavingsMilestone,
            "budget_alert" => NotificationType::BudgetAlert,
            "transaction_alert" => NotificationType::TransactionAlert,
            "daily_reminder" => NotificationType::DailyReminder,
            "weekly_summary" => NotificationType::WeeklySummary,
            "monthly_summary" => NotificationType::MonthlySummary,
            "account_update" => NotificationType::AccountUpdate,
            "security_alert" => NotificationType::SecurityAlert,
            _ => NotificationType::System,
        }
    }
}

/// Delivery channel (where to send)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    /// Email delivery via SMTP
    Email,
    /// Push notification to registered devices
    Push,
    /// In-app notification (the stored record itself)
    InApp,
}

impl NotificationChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationChannel::Email => "email",
            NotificationChannel::Push => "push",
            NotificationChannel::InApp => "in_app",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "email" => Some(NotificationChannel::Email),
            "push" => Some(NotificationChannel::Push),
            "in_app" | "inapp" => Some(NotificationChannel::InApp),
            _ => None,
        }
    }

    pub const ALL: [NotificationChannel; 3] = [
        NotificationChannel::Email,
        NotificationChannel::Push,
        NotificationChannel::InApp,
    ];
}

/// Notification priority level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    /// Urgent notifications bypass quiet hours
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Medium => "medium",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "low" => NotificationPriority::Low,
            "high" => NotificationPriority::High,
            "urgent" => NotificationPriority::Urgent,
            _ => NotificationPriority::Medium,
        }
    }
}

/// Lifecycle status of a notification record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    /// Created, at least one requested channel not yet sent
    Pending,
    /// Every requested and enabled channel reported sent
    Sent,
    /// Sweep processing raised an unhandled error, or the retry cap was hit
    Failed,
    /// Reserved for explicit cancellation; never set by the sweep path
    Cancelled,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "sent" => NotificationStatus::Sent,
            "failed" => NotificationStatus::Failed,
            "cancelled" => NotificationStatus::Cancelled,
            _ => NotificationStatus::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Sent | NotificationStatus::Failed | NotificationStatus::Cancelled
        )
    }
}

/// Per-channel delivery state on a notification record
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelState {
    pub email_sent: bool,
    pub email_sent_at: Option<DateTime<Utc>>,
    pub push_sent: bool,
    pub push_sent_at: Option<DateTime<Utc>>,
    pub in_app_sent: bool,
    pub in_app_sent_at: Option<DateTime<Utc>>,
    /// Only meaningful for the in-app channel; false -> true, never back
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
}

impl ChannelState {
    pub fn is_sent(&self, channel: NotificationChannel) -> bool {
        match channel {
            NotificationChannel::Email => self.email_sent,
            NotificationChannel::Push => self.push_sent,
            NotificationChannel::InApp => self.in_app_sent,
        }
    }

    pub fn mark_sent(&mut self, channel: NotificationChannel, at: DateTime<Utc>) {
        match channel {
            NotificationChannel::Email => {
                self.email_sent = true;
                self.email_sent_at = Some(at);
            }
            NotificationChannel::Push => {
                self.push_sent = true;
                self.push_sent_at = Some(at);
            }
            NotificationChannel::InApp => {
                self.in_app_sent = true;
                self.in_app_sent_at = Some(at);
            }
        }
    }
}

/// Persisted notification record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRecord {
    pub id: Uuid,

    /// Recipient user ID
    pub user_id: Uuid,

    pub notification_type: NotificationType,

    pub title: String,

    pub message: String,

    /// Opaque payload forwarded to channel senders
    pub payload: Option<serde_json::Value>,

    /// Channels requested at dispatch time
    pub channels: Vec<NotificationChannel>,

    pub channel_state: ChannelState,

    pub priority: NotificationPriority,

    pub status: NotificationStatus,

    /// No channel is attempted before this instant
    pub scheduled_for: DateTime<Utc>,

    /// Advisory retention cutoff; not enforced in the delivery path
    pub expires_at: DateTime<Utc>,

    /// Number of sweep passes that have picked this record up
    pub retry_count: i32,

    pub source: Option<String>,

    pub category: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

/// Default record retention window
pub const DEFAULT_EXPIRY_DAYS: i64 = 30;

/// Transient request to dispatch a notification; seeds a NotificationRecord
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationRequest {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub payload: Option<serde_json::Value>,
    #[serde(default = "default_channels")]
    pub channels: Vec<NotificationChannel>,
    #[serde(default = "default_priority")]
    pub priority: NotificationPriority,
    /// Defaults to now when absent
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

fn default_priority() -> NotificationPriority {
    NotificationPriority::Medium
}

fn default_channels() -> Vec<NotificationChannel> {
    vec![NotificationChannel::InApp]
}

impl NotificationRequest {
    /// Build the pending record this request seeds, with all channel flags false.
    pub fn into_record(self, now: DateTime<Utc>, scheduled_for: DateTime<Utc>) -> NotificationRecord {
        NotificationRecord {
            id: Uuid::new_v4(),
            user_id: self.user_id,
            notification_type: self.notification_type,
            title: self.title,
            message: self.message,
            payload: self.payload,
            channels: self.channels,
            channel_state: ChannelState::default(),
            priority: self.priority,
            status: NotificationStatus::Pending,
            scheduled_for,
            expires_at: now + Duration::days(DEFAULT_EXPIRY_DAYS),
            retry_count: 0,
            source: self.source,
            category: self.category,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Delivery frequency for a channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[default]
    Immediate,
    DailyDigest,
    WeeklyDigest,
}

/// Per-channel preference: a global switch plus a per-type override map.
/// A type absent from the map is enabled by default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChannelPreference {
    pub enabled: bool,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub types: HashMap<NotificationType, bool>,
}

impl Default for ChannelPreference {
    fn default() -> Self {
        Self {
            enabled: true,
            frequency: Frequency::Immediate,
            types: HashMap::new(),
        }
    }
}

impl ChannelPreference {
    pub fn allows(&self, notification_type: NotificationType) -> bool {
        self.enabled && self.types.get(&notification_type).copied().unwrap_or(true)
    }
}

/// User-configured window during which non-urgent notifications are deferred
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuietHours {
    pub enabled: bool,
    /// "HH:MM", local to `timezone`
    pub start: String,
    /// "HH:MM"; a window with end < start crosses midnight
    pub end: String,
    /// IANA timezone name, e.g. "America/New_York"
    pub timezone: String,
}

impl Default for QuietHours {
    fn default() -> Self {
        Self {
            enabled: false,
            start: "22:00".to_string(),
            end: "08:00".to_string(),
            timezone: "UTC".to_string(),
        }
    }
}

/// Per-user notification preferences (1:1 with user)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub email: ChannelPreference,
    pub push: ChannelPreference,
    pub in_app: ChannelPreference,
    pub quiet_hours: QuietHours,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreferences {
    pub fn defaults_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            email: ChannelPreference::default(),
            push: ChannelPreference::default(),
            in_app: ChannelPreference::default(),
            quiet_hours: QuietHours::default(),
            updated_at: Utc::now(),
        }
    }

    pub fn channel(&self, channel: NotificationChannel) -> &ChannelPreference {
        match channel {
            NotificationChannel::Email => &self.email,
            NotificationChannel::Push => &self.push,
            NotificationChannel::InApp => &self.in_app,
        }
    }

    /// The channel must be globally enabled and the specific type not opted out.
    pub fn is_channel_enabled(
        &self,
        channel: NotificationChannel,
        notification_type: NotificationType,
    ) -> bool {
        self.channel(channel).allows(notification_type)
    }
}

/// Registered push device token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    /// "ios", "android" or "web"
    pub platform: String,
    pub is_active: bool,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Savings goal, read from the domain collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: DateTime<Utc>,
}

impl Goal {
    pub fn is_achieved(&self) -> bool {
        self.current_amount >= self.target_amount
    }
}

/// Application user, read from the domain collaborator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub name: String,
}
