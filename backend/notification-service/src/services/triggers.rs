//! Domain-event entry points that turn store writes into notifications.

use std::sync::Arc;

use serde_json::json;
use tracing::info;

use crate::error::Result;
use crate::models::{
    Goal, NotificationChannel, NotificationPriority, NotificationRecord, NotificationRequest,
    NotificationType,
};
use crate::services::dispatcher::Dispatcher;
use crate::store::SavingsStore;
use uuid::Uuid;

/// Milestone spacing for cumulative savings.
pub const MILESTONE_STEP: f64 = 1000.0;

/// The highest multiple-of-step boundary crossed by moving the running total
/// from `previous` to `current`, if any. Crossing 999 -> 1001 yields 1000;
/// 1001 -> 1050 yields nothing.
pub fn milestone_crossed(previous: f64, current: f64) -> Option<i64> {
    if current <= previous || current < MILESTONE_STEP {
        return None;
    }

    let previous_step = (previous.max(0.0) / MILESTONE_STEP).floor() as i64;
    let current_step = (current / MILESTONE_STEP).floor() as i64;

    if current_step > previous_step {
        Some(current_step * MILESTONE_STEP as i64)
    } else {
        None
    }
}

/// Turns savings writes and goal completions into notification requests.
pub struct TriggerService {
    dispatcher: Arc<Dispatcher>,
    savings: Arc<dyn SavingsStore>,
}

impl TriggerService {
    pub fn new(dispatcher: Arc<Dispatcher>, savings: Arc<dyn SavingsStore>) -> Self {
        Self {
            dispatcher,
            savings,
        }
    }

    /// Called after a savings contribution of `amount` has been written.
    /// Fires a milestone notification when the running total crossed a
    /// boundary within this write.
    pub async fn savings_recorded(
        &self,
        user_id: Uuid,
        amount: f64,
    ) -> Result<Option<NotificationRecord>> {
        let total = self.savings.total_for_user(user_id).await?;
        let previous = total - amount;

        let Some(milestone) = milestone_crossed(previous, total) else {
            return Ok(None);
        };

        info!(%user_id, milestone, "savings milestone crossed");

        let request = NotificationRequest {
            user_id,
            notification_type: NotificationType::SavingsMilestone,
            title: format!("You passed ${milestone} in savings!"),
            message: format!(
                "Your total savings just crossed ${milestone}. Current total: ${total:.2}."
            ),
            payload: Some(json!({ "milestone": milestone, "total": total })),
            channels: vec![NotificationChannel::InApp, NotificationChannel::Push],
            priority: NotificationPriority::Medium,
            scheduled_for: None,
            source: Some("savings".to_string()),
            category: Some("milestones".to_string()),
        };

        Ok(Some(self.dispatcher.send(request).await?))
    }

    /// Called when a goal's current amount reaches its target.
    pub async fn goal_achieved(&self, goal: &Goal) -> Result<NotificationRecord> {
        let request = NotificationRequest {
            user_id: goal.user_id,
            notification_type: NotificationType::GoalAchieved,
            title: format!("Goal reached: {}", goal.title),
            message: format!(
                "You saved the full ${:.2} for \"{}\". Time to set the next one?",
                goal.target_amount, goal.title
            ),
            payload: Some(json!({ "goal_id": goal.id, "target": goal.target_amount })),
            channels: vec![
                NotificationChannel::InApp,
                NotificationChannel::Push,
                NotificationChannel::Email,
            ],
            priority: NotificationPriority::High,
            scheduled_for: None,
            source: Some("goals".to_string()),
            category: Some("goals".to_string()),
        };

        self.dispatcher.send(request).await
    }
}
