//! Notification dispatcher.
//!
//! Resolves a request against the user's preference record, applies
//! quiet-hours deferral, persists the record, and fans out across the
//! enabled channels with all-settle semantics: one channel's failure never
//! blocks or fails a sibling.

use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    NotificationChannel, NotificationPreferences, NotificationPriority, NotificationRecord,
    NotificationRequest, NotificationStatus,
};
use crate::services::channels::ChannelSender;
use crate::services::quiet_hours;
use crate::store::{NotificationStore, PreferenceStore};

pub struct Dispatcher {
    notifications: Arc<dyn NotificationStore>,
    preferences: Arc<dyn PreferenceStore>,
    senders: Vec<Arc<dyn ChannelSender>>,
}

impl Dispatcher {
    pub fn new(
        notifications: Arc<dyn NotificationStore>,
        preferences: Arc<dyn PreferenceStore>,
        senders: Vec<Arc<dyn ChannelSender>>,
    ) -> Self {
        Self {
            notifications,
            preferences,
            senders,
        }
    }

    fn sender_for(&self, channel: NotificationChannel) -> Option<&Arc<dyn ChannelSender>> {
        self.senders.iter().find(|s| s.channel() == channel)
    }

    /// Accept a notification request: resolve preferences, defer for quiet
    /// hours, persist a pending record, and attempt the due channels.
    ///
    /// A user without a provisioned preference record is a configuration
    /// error; nothing is persisted in that case.
    pub async fn send(&self, request: NotificationRequest) -> Result<NotificationRecord> {
        let now = Utc::now();

        let prefs = self
            .preferences
            .find_by_user(request.user_id)
            .await?
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no preference record for user {}",
                    request.user_id
                ))
            })?;

        let mut scheduled_for = request.scheduled_for.unwrap_or(now);
        if request.priority != NotificationPriority::Urgent
            && quiet_hours::is_in_quiet_hours(&prefs.quiet_hours, now)
        {
            scheduled_for = quiet_hours::next_quiet_hours_end(&prefs.quiet_hours, now);
            debug!(
                user_id = %request.user_id,
                notification_type = request.notification_type.as_str(),
                deferred_to = %scheduled_for,
                "quiet hours active, deferring"
            );
        }

        metrics::observe_dispatch(
            request.notification_type.as_str(),
            request.priority.as_str(),
        );

        let mut record = request.into_record(now, scheduled_for);
        self.notifications.insert(&record).await?;

        info!(
            notification_id = %record.id,
            user_id = %record.user_id,
            notification_type = record.notification_type.as_str(),
            "notification created"
        );

        if record.scheduled_for <= now {
            self.deliver_channels(&mut record, &prefs).await?;
            self.finalize_status(&mut record, &prefs).await?;
        }

        Ok(record)
    }

    /// Attempt every requested channel that is enabled, due, and not already
    /// sent. Channel attempts run concurrently and settle independently:
    /// a sender error is caught here, logged, and leaves that channel's flag
    /// unset for the next sweep pass.
    pub async fn deliver_channels(
        &self,
        record: &mut NotificationRecord,
        prefs: &NotificationPreferences,
    ) -> Result<()> {
        let results = {
            let snapshot: &NotificationRecord = record;
            let mut attempts = Vec::new();

            for &channel in &snapshot.channels {
                // Re-invoking an already-sent channel must be a no-op
                if snapshot.channel_state.is_sent(channel) {
                    continue;
                }
                if !prefs.is_channel_enabled(channel, snapshot.notification_type) {
                    debug!(
                        notification_id = %snapshot.id,
                        channel = channel.as_str(),
                        "channel disabled by preferences, skipping"
                    );
                    continue;
                }
                let Some(sender) = self.sender_for(channel) else {
                    warn!(channel = channel.as_str(), "no sender registered for channel");
                    continue;
                };

                attempts
                    .push(async move { (channel, sender.deliver(snapshot, prefs).await) });
            }

            join_all(attempts).await
        };

        for (channel, result) in results {
            match result {
                Ok(outcome) if outcome.delivered() => {
                    let at = Utc::now();
                    self.notifications
                        .mark_channel_sent(record.id, channel, at)
                        .await?;
                    record.channel_state.mark_sent(channel, at);
                    metrics::observe_channel_delivery(channel.as_str(), "delivered");
                }
                Ok(outcome) => {
                    warn!(
                        notification_id = %record.id,
                        user_id = %record.user_id,
                        channel = channel.as_str(),
                        failed = outcome.recipients.iter().filter(|r| !r.success).count(),
                        "channel delivery failed for all recipients"
                    );
                    metrics::observe_channel_delivery(channel.as_str(), "failed");
                }
                Err(e) => {
                    warn!(
                        notification_id = %record.id,
                        user_id = %record.user_id,
                        notification_type = record.notification_type.as_str(),
                        channel = channel.as_str(),
                        error = %e,
                        "channel sender error"
                    );
                    metrics::observe_channel_delivery(channel.as_str(), "error");
                }
            }
        }

        Ok(())
    }

    /// Promote the record to `sent` when every requested-and-enabled channel
    /// reports sent. Anything short of that leaves it `pending` for the
    /// sweep; `failed` is never set from this path.
    pub async fn finalize_status(
        &self,
        record: &mut NotificationRecord,
        prefs: &NotificationPreferences,
    ) -> Result<bool> {
        let all_sent = record
            .channels
            .iter()
            .filter(|&&c| prefs.is_channel_enabled(c, record.notification_type))
            .all(|&c| record.channel_state.is_sent(c));

        if all_sent && record.status == NotificationStatus::Pending {
            self.notifications
                .set_status(record.id, NotificationStatus::Sent)
                .await?;
            record.status = NotificationStatus::Sent;
        }

        Ok(all_sent)
    }
}
