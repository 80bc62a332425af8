mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use uuid::Uuid;

use common::{request_for, FakeSender, InMemoryNotificationStore, InMemoryPreferenceStore};
use notification_service::error::AppError;
use notification_service::models::{
    NotificationChannel, NotificationPreferences, NotificationPriority, NotificationStatus,
    NotificationType,
};
use notification_service::services::channels::ChannelSender;
use notification_service::services::Dispatcher;

struct Harness {
    notifications: Arc<InMemoryNotificationStore>,
    preferences: Arc<InMemoryPreferenceStore>,
    email: Arc<FakeSender>,
    push: Arc<FakeSender>,
    in_app: Arc<FakeSender>,
    dispatcher: Dispatcher,
}

fn harness(prefs: Option<NotificationPreferences>) -> Harness {
    let notifications = Arc::new(InMemoryNotificationStore::new());
    let preferences = Arc::new(match prefs {
        Some(p) => InMemoryPreferenceStore::with_prefs(p),
        None => InMemoryPreferenceStore::new(),
    });
    let email = Arc::new(FakeSender::new(NotificationChannel::Email));
    let push = Arc::new(FakeSender::new(NotificationChannel::Push));
    let in_app = Arc::new(FakeSender::new(NotificationChannel::InApp));

    let senders: Vec<Arc<dyn ChannelSender>> =
        vec![email.clone(), push.clone(), in_app.clone()];
    let dispatcher = Dispatcher::new(notifications.clone(), preferences.clone(), senders);

    Harness {
        notifications,
        preferences,
        email,
        push,
        in_app,
        dispatcher,
    }
}

#[tokio::test]
async fn dispatch_delivers_all_enabled_channels_and_marks_sent() {
    let user_id = Uuid::new_v4();
    let h = harness(Some(NotificationPreferences::defaults_for(user_id)));

    let record = h
        .dispatcher
        .send(request_for(user_id, NotificationChannel::ALL.to_vec()))
        .await
        .unwrap();

    assert_eq!(record.status, NotificationStatus::Sent);
    assert!(record.channel_state.email_sent);
    assert!(record.channel_state.push_sent);
    assert!(record.channel_state.in_app_sent);
    assert_eq!(h.email.calls(), 1);
    assert_eq!(h.push.calls(), 1);
    assert_eq!(h.in_app.calls(), 1);

    let stored = h.notifications.get(record.id).unwrap();
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert!(stored.channel_state.email_sent_at.is_some());
}

#[tokio::test]
async fn dispatch_without_preferences_is_a_configuration_error() {
    let user_id = Uuid::new_v4();
    let h = harness(None);

    let err = h
        .dispatcher
        .send(request_for(user_id, NotificationChannel::ALL.to_vec()))
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Configuration(_)));
    // Nothing is persisted when preference resolution fails
    assert_eq!(h.notifications.len(), 0);
}

#[tokio::test]
async fn quiet_hours_defer_without_touching_senders() {
    let user_id = Uuid::new_v4();
    let mut prefs = NotificationPreferences::defaults_for(user_id);
    prefs.quiet_hours.enabled = true;
    prefs.quiet_hours.start = "00:00".to_string();
    prefs.quiet_hours.end = "23:59".to_string();
    prefs.quiet_hours.timezone = "UTC".to_string();
    let h = harness(Some(prefs));

    let record = h
        .dispatcher
        .send(request_for(user_id, NotificationChannel::ALL.to_vec()))
        .await
        .unwrap();

    assert_eq!(record.status, NotificationStatus::Pending);
    assert!(record.scheduled_for > Utc::now());
    assert_eq!(h.email.calls(), 0);
    assert_eq!(h.push.calls(), 0);
    assert_eq!(h.in_app.calls(), 0);
}

#[tokio::test]
async fn urgent_priority_bypasses_quiet_hours() {
    let user_id = Uuid::new_v4();
    let mut prefs = NotificationPreferences::defaults_for(user_id);
    prefs.quiet_hours.enabled = true;
    prefs.quiet_hours.start = "00:00".to_string();
    prefs.quiet_hours.end = "23:59".to_string();
    let h = harness(Some(prefs));

    let mut request = request_for(user_id, vec![NotificationChannel::Push]);
    request.notification_type = NotificationType::SecurityAlert;
    request.priority = NotificationPriority::Urgent;

    let record = h.dispatcher.send(request).await.unwrap();

    assert_eq!(record.status, NotificationStatus::Sent);
    assert_eq!(h.push.calls(), 1);
}

#[tokio::test]
async fn one_channel_failure_never_blocks_siblings() {
    let user_id = Uuid::new_v4();
    let h = harness(Some(NotificationPreferences::defaults_for(user_id)));
    h.email.set_fail(true);

    let record = h
        .dispatcher
        .send(request_for(user_id, NotificationChannel::ALL.to_vec()))
        .await
        .unwrap();

    // Push and in-app land; the record stays pending for the sweep to
    // retry the email channel.
    assert_eq!(record.status, NotificationStatus::Pending);
    assert!(!record.channel_state.email_sent);
    assert!(record.channel_state.push_sent);
    assert!(record.channel_state.in_app_sent);
}

#[tokio::test]
async fn disabled_channel_is_skipped_and_does_not_gate_completion() {
    let user_id = Uuid::new_v4();
    let mut prefs = NotificationPreferences::defaults_for(user_id);
    prefs.push.enabled = false;
    let h = harness(Some(prefs));

    let record = h
        .dispatcher
        .send(request_for(user_id, NotificationChannel::ALL.to_vec()))
        .await
        .unwrap();

    assert_eq!(h.push.calls(), 0);
    assert!(!record.channel_state.push_sent);
    // The disabled channel does not hold the record open
    assert_eq!(record.status, NotificationStatus::Sent);
}

#[tokio::test]
async fn per_type_opt_out_disables_only_that_type() {
    let user_id = Uuid::new_v4();
    let mut prefs = NotificationPreferences::defaults_for(user_id);
    prefs
        .email
        .types
        .insert(NotificationType::BudgetAlert, false);
    let h = harness(Some(prefs));

    let record = h
        .dispatcher
        .send(request_for(user_id, NotificationChannel::ALL.to_vec()))
        .await
        .unwrap();

    assert_eq!(h.email.calls(), 0);
    assert_eq!(record.status, NotificationStatus::Sent);

    // A type absent from the override map stays enabled
    let mut other = request_for(user_id, vec![NotificationChannel::Email]);
    other.notification_type = NotificationType::GoalAchieved;
    let record = h.dispatcher.send(other).await.unwrap();
    assert_eq!(h.email.calls(), 1);
    assert!(record.channel_state.email_sent);
}

#[tokio::test]
async fn explicit_future_schedule_defers_delivery() {
    let user_id = Uuid::new_v4();
    let h = harness(Some(NotificationPreferences::defaults_for(user_id)));

    let mut request = request_for(user_id, vec![NotificationChannel::InApp]);
    let later = Utc::now() + Duration::hours(2);
    request.scheduled_for = Some(later);

    let record = h.dispatcher.send(request).await.unwrap();

    assert_eq!(record.status, NotificationStatus::Pending);
    assert_eq!(record.scheduled_for, later);
    assert_eq!(h.in_app.calls(), 0);
}

#[tokio::test]
async fn preference_update_applies_to_subsequent_dispatches() {
    let user_id = Uuid::new_v4();
    let h = harness(Some(NotificationPreferences::defaults_for(user_id)));

    h.dispatcher
        .send(request_for(user_id, vec![NotificationChannel::Email]))
        .await
        .unwrap();
    assert_eq!(h.email.calls(), 1);

    let mut prefs = NotificationPreferences::defaults_for(user_id);
    prefs.email.enabled = false;
    h.preferences.put(prefs);

    h.dispatcher
        .send(request_for(user_id, vec![NotificationChannel::Email]))
        .await
        .unwrap();
    assert_eq!(h.email.calls(), 1);
}
