//! Delivery channels.
//!
//! Each sender takes a notification record plus the preference snapshot taken
//! at dispatch time, attempts delivery, and reports per-recipient outcomes.
//! Partial failures never raise; only a hard transport-level failure
//! propagates, to be caught by the dispatcher's per-channel handling.

pub mod email;
pub mod in_app;
pub mod push;

pub use email::{EmailSender, MailTransport, RenderedEmail, SmtpMailer, TemplateRegistry};
pub use in_app::InAppSender;
pub use push::{HttpPushTransport, PushReceipt, PushSender, PushTransport};

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::{NotificationChannel, NotificationPreferences, NotificationRecord};

/// Outcome for one recipient (an email address, a device token, ...).
#[derive(Debug, Clone, Serialize)]
pub struct RecipientOutcome {
    pub recipient: String,
    pub success: bool,
    pub error: Option<String>,
}

/// Per-recipient delivery outcome for one channel attempt.
#[derive(Debug, Clone, Serialize)]
pub struct DeliveryOutcome {
    pub channel: NotificationChannel,
    pub recipients: Vec<RecipientOutcome>,
}

impl DeliveryOutcome {
    /// An attempt with nothing to deliver to (no recipients) counts as
    /// delivered; retrying it would never change the result.
    pub fn delivered(&self) -> bool {
        self.recipients.is_empty() || self.recipients.iter().any(|r| r.success)
    }

    pub fn empty(channel: NotificationChannel) -> Self {
        Self {
            channel,
            recipients: Vec::new(),
        }
    }

    pub fn single(channel: NotificationChannel, recipient: String) -> Self {
        Self {
            channel,
            recipients: vec![RecipientOutcome {
                recipient,
                success: true,
                error: None,
            }],
        }
    }
}

/// Common contract for the three delivery channels.
#[async_trait]
pub trait ChannelSender: Send + Sync {
    fn channel(&self) -> NotificationChannel;

    async fn deliver(
        &self,
        record: &NotificationRecord,
        preferences: &NotificationPreferences,
    ) -> Result<DeliveryOutcome>;
}
