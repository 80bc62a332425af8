//! In-app delivery.
//!
//! The notification record written at dispatch time IS the in-app
//! notification; this sender only exists so the channel participates in the
//! common sent/sent_at bookkeeping.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{NotificationChannel, NotificationPreferences, NotificationRecord};
use crate::services::channels::{ChannelSender, DeliveryOutcome};

pub struct InAppSender;

#[async_trait]
impl ChannelSender for InAppSender {
    fn channel(&self) -> NotificationChannel {
        NotificationChannel::InApp
    }

    async fn deliver(
        &self,
        record: &NotificationRecord,
        _preferences: &NotificationPreferences,
    ) -> Result<DeliveryOutcome> {
        // Content is already durably stored; nothing can fail here.
        Ok(DeliveryOutcome::single(
            NotificationChannel::InApp,
            record.user_id.to_string(),
        ))
    }
}
