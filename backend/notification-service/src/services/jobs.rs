//! Recurring cadence jobs.
//!
//! The full set of schedule-triggered jobs lives in one declarative table so
//! it is enumerable and each handler can be invoked directly in tests
//! without waiting on wall-clock time. Schedules are `cron::Schedule`
//! expressions (sec min hour day-of-month month day-of-week).

use std::str::FromStr;

use cron::Schedule;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CadenceJobKind {
    /// Remind users about active goals nearing their target date with
    /// insufficient progress.
    DailyGoalReminders,
    /// Weekly savings summary per user.
    WeeklySavingsSummary,
    /// Monthly spending summary per user.
    MonthlySpendingSummary,
}

pub struct CadenceJob {
    pub name: &'static str,
    pub schedule: Schedule,
    pub kind: CadenceJobKind,
}

pub fn jobs() -> Vec<CadenceJob> {
    vec![
        CadenceJob {
            name: "daily_goal_reminders",
            schedule: Schedule::from_str("0 0 9 * * *")
                .expect("invalid daily_goal_reminders schedule"),
            kind: CadenceJobKind::DailyGoalReminders,
        },
        CadenceJob {
            name: "weekly_savings_summary",
            schedule: Schedule::from_str("0 0 9 * * Mon")
                .expect("invalid weekly_savings_summary schedule"),
            kind: CadenceJobKind::WeeklySavingsSummary,
        },
        CadenceJob {
            name: "monthly_spending_summary",
            schedule: Schedule::from_str("0 0 9 1 * *")
                .expect("invalid monthly_spending_summary schedule"),
            kind: CadenceJobKind::MonthlySpendingSummary,
        },
    ]
}
