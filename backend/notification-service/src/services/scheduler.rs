//! Notification scheduler.
//!
//! Two independent recurring drivers in one process: a sweep that re-drives
//! due pending records through the dispatcher's channel fan-out, and a
//! cadence loop that fires the declarative job table against the domain
//! stores. Failures are isolated to the smallest unit: one record in the
//! sweep, one user in a cadence job.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tokio::time::interval;
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{
    NotificationChannel, NotificationPriority, NotificationRecord, NotificationRequest,
    NotificationStatus, NotificationType, User,
};
use crate::services::dispatcher::Dispatcher;
use crate::services::jobs::{jobs, CadenceJobKind};
use crate::store::{GoalStore, NotificationStore, PreferenceStore, SavingsStore, UserStore};

/// Sweep passes a record may consume before it is marked failed instead of
/// being retried until its expiry.
pub const MAX_SWEEP_ATTEMPTS: i32 = 10;

/// Goals whose target date is within this many days qualify for reminders.
const GOAL_DEADLINE_THRESHOLD_DAYS: i64 = 7;

pub struct Scheduler {
    dispatcher: Arc<Dispatcher>,
    notifications: Arc<dyn NotificationStore>,
    preferences: Arc<dyn PreferenceStore>,
    goals: Arc<dyn GoalStore>,
    savings: Arc<dyn SavingsStore>,
    users: Arc<dyn UserStore>,
    config: SchedulerConfig,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        notifications: Arc<dyn NotificationStore>,
        preferences: Arc<dyn PreferenceStore>,
        goals: Arc<dyn GoalStore>,
        savings: Arc<dyn SavingsStore>,
        users: Arc<dyn UserStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            dispatcher,
            notifications,
            preferences,
            goals,
            savings,
            users,
            config,
        }
    }

    /// Spawn the sweep and cadence loops. Single instance per process.
    pub fn start(self: &Arc<Self>) {
        let sweeper = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_secs(sweeper.config.sweep_interval_secs));
            loop {
                ticker.tick().await;
                match sweeper.sweep_once(Utc::now()).await {
                    Ok(count) => {
                        if count > 0 {
                            info!(count, "sweep processed due notifications");
                        }
                    }
                    Err(e) => {
                        error!(error = %e, "sweep pass failed");
                    }
                }
            }
        });

        let cadence = Arc::clone(self);
        tokio::spawn(async move {
            let table = jobs();
            let mut last_tick = Utc::now();
            let mut ticker = interval(Duration::from_secs(cadence.config.cadence_tick_secs));
            loop {
                ticker.tick().await;
                let now = Utc::now();
                for job in &table {
                    let due = job
                        .schedule
                        .after(&last_tick)
                        .next()
                        .map(|t| t <= now)
                        .unwrap_or(false);
                    if due {
                        info!(job = job.name, "running cadence job");
                        if let Err(e) = cadence.run_job(job.kind).await {
                            error!(job = job.name, error = %e, "cadence job failed");
                        }
                    }
                }
                last_tick = now;
            }
        });
    }

    /// One sweep pass: load the due batch and re-drive each record through
    /// the channel fan-out. An unhandled error while processing a record
    /// marks that record failed and the pass continues.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<u64> {
        let due = self
            .notifications
            .due_for_sweep(now, self.config.sweep_batch_size)
            .await?;

        let mut processed = 0;
        for mut record in due {
            match self.process_record(&mut record).await {
                Ok(()) => {
                    metrics::observe_sweep_record(record.status.as_str());
                }
                Err(e) => {
                    error!(
                        notification_id = %record.id,
                        user_id = %record.user_id,
                        notification_type = record.notification_type.as_str(),
                        error = %e,
                        "sweep record failed"
                    );
                    metrics::observe_sweep_record("failed");
                    if let Err(status_err) = self
                        .notifications
                        .set_status(record.id, NotificationStatus::Failed)
                        .await
                    {
                        error!(
                            notification_id = %record.id,
                            error = %status_err,
                            "could not mark swept record failed"
                        );
                    }
                }
            }
            processed += 1;
        }

        Ok(processed)
    }

    async fn process_record(&self, record: &mut NotificationRecord) -> Result<()> {
        let attempts = self.notifications.increment_retry(record.id).await?;
        if attempts > MAX_SWEEP_ATTEMPTS {
            warn!(
                notification_id = %record.id,
                user_id = %record.user_id,
                attempts,
                "retry cap exceeded, marking failed"
            );
            self.notifications
                .set_status(record.id, NotificationStatus::Failed)
                .await?;
            record.status = NotificationStatus::Failed;
            return Ok(());
        }

        // Preferences are re-read each pass; a user may have toggled a
        // channel since the record was created.
        let prefs = self
            .preferences
            .find_by_user(record.user_id)
            .await?
            .ok_or_else(|| {
                AppError::Configuration(format!(
                    "no preference record for user {}",
                    record.user_id
                ))
            })?;

        self.dispatcher.deliver_channels(record, &prefs).await?;
        self.dispatcher.finalize_status(record, &prefs).await?;
        Ok(())
    }

    /// Run one cadence job by kind. Public so tests drive handlers directly.
    pub async fn run_job(&self, kind: CadenceJobKind) -> Result<()> {
        match kind {
            CadenceJobKind::DailyGoalReminders => self.daily_goal_reminders().await,
            CadenceJobKind::WeeklySavingsSummary => self.weekly_savings_summary().await,
            CadenceJobKind::MonthlySpendingSummary => self.monthly_spending_summary().await,
        }
    }

    async fn daily_goal_reminders(&self) -> Result<()> {
        let goals = self
            .goals
            .find_active_nearing_deadline(GOAL_DEADLINE_THRESHOLD_DAYS)
            .await?;

        for goal in goals {
            let remaining = goal.target_amount - goal.current_amount;
            let request = NotificationRequest {
                user_id: goal.user_id,
                notification_type: NotificationType::GoalReminder,
                title: format!("\"{}\" is due soon", goal.title),
                message: format!(
                    "You have saved ${:.2} of ${:.2}. ${:.2} to go before {}.",
                    goal.current_amount,
                    goal.target_amount,
                    remaining,
                    goal.target_date.format("%Y-%m-%d"),
                ),
                payload: Some(json!({ "goal_id": goal.id, "remaining": remaining })),
                channels: vec![
                    NotificationChannel::InApp,
                    NotificationChannel::Push,
                    NotificationChannel::Email,
                ],
                priority: NotificationPriority::Medium,
                scheduled_for: None,
                source: Some("scheduler".to_string()),
                category: Some("goals".to_string()),
            };

            // One user's failure must not abort the batch
            if let Err(e) = self.dispatcher.send(request).await {
                warn!(
                    user_id = %goal.user_id,
                    goal_id = %goal.id,
                    error = %e,
                    "goal reminder dispatch failed"
                );
            }
        }

        Ok(())
    }

    async fn weekly_savings_summary(&self) -> Result<()> {
        for user in self.users.list_all().await? {
            if let Err(e) = self.send_savings_summary(&user, NotificationType::WeeklySummary).await
            {
                warn!(
                    user_id = %user.id,
                    error = %e,
                    "weekly summary dispatch failed"
                );
            }
        }
        Ok(())
    }

    async fn monthly_spending_summary(&self) -> Result<()> {
        for user in self.users.list_all().await? {
            if let Err(e) = self
                .send_savings_summary(&user, NotificationType::MonthlySummary)
                .await
            {
                warn!(
                    user_id = %user.id,
                    error = %e,
                    "monthly summary dispatch failed"
                );
            }
        }
        Ok(())
    }

    async fn send_savings_summary(
        &self,
        user: &User,
        notification_type: NotificationType,
    ) -> Result<()> {
        let total = self.savings.total_for_user(user.id).await?;

        let (title, message) = match notification_type {
            NotificationType::MonthlySummary => (
                "Your monthly summary".to_string(),
                format!("Total savings stand at ${total:.2}. Open the app for the full breakdown."),
            ),
            _ => (
                "Your week in savings".to_string(),
                format!("You are at ${total:.2} in total savings. Keep it up!"),
            ),
        };

        let request = NotificationRequest {
            user_id: user.id,
            notification_type,
            title,
            message,
            payload: Some(json!({ "total_savings": total })),
            channels: vec![NotificationChannel::InApp, NotificationChannel::Email],
            priority: NotificationPriority::Low,
            scheduled_for: None,
            source: Some("scheduler".to_string()),
            category: Some("summaries".to_string()),
        };

        self.dispatcher.send(request).await?;
        Ok(())
    }
}
