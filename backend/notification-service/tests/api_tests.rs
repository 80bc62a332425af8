mod common;

use std::sync::Arc;

use actix_web::{test, web, App};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{request_for, FakeSender, InMemoryNotificationStore, InMemoryPreferenceStore};
use notification_service::handlers::{
    devices::register_routes as register_devices,
    notifications::register_routes as register_notifications,
    preferences::register_routes as register_preferences,
};
use notification_service::models::{NotificationChannel, NotificationPreferences};
use notification_service::services::channels::ChannelSender;
use notification_service::services::Dispatcher;
use notification_service::store::{NotificationStore, PreferenceStore};

struct TestState {
    notifications: Arc<InMemoryNotificationStore>,
    preferences: Arc<InMemoryPreferenceStore>,
    dispatcher: Arc<Dispatcher>,
}

fn state() -> TestState {
    let notifications = Arc::new(InMemoryNotificationStore::new());
    let preferences = Arc::new(InMemoryPreferenceStore::new());
    let senders: Vec<Arc<dyn ChannelSender>> = vec![
        Arc::new(FakeSender::new(NotificationChannel::Email)),
        Arc::new(FakeSender::new(NotificationChannel::Push)),
        Arc::new(FakeSender::new(NotificationChannel::InApp)),
    ];
    let dispatcher = Arc::new(Dispatcher::new(
        notifications.clone(),
        preferences.clone(),
        senders,
    ));
    TestState {
        notifications,
        preferences,
        dispatcher,
    }
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new(
                    $state.notifications.clone() as Arc<dyn NotificationStore>
                ))
                .app_data(web::Data::new(
                    $state.preferences.clone() as Arc<dyn PreferenceStore>
                ))
                .app_data(web::Data::new($state.dispatcher.clone()))
                .configure(|cfg| {
                    register_notifications(cfg);
                    register_devices(cfg);
                    register_preferences(cfg);
                }),
        )
        .await
    };
}

#[actix_web::test]
async fn list_and_unread_count_reflect_delivered_notifications() {
    let user_id = Uuid::new_v4();
    let state = state();
    state
        .preferences
        .put(NotificationPreferences::defaults_for(user_id));
    let app = app!(state);

    for _ in 0..3 {
        state
            .dispatcher
            .send(request_for(user_id, vec![NotificationChannel::InApp]))
            .await
            .unwrap();
    }

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/notifications/user/{}", user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let req = test::TestRequest::get()
        .uri(&format!(
            "/api/v1/notifications/user/{}/unread-count",
            user_id
        ))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["count"], json!(3));
}

#[actix_web::test]
async fn mark_read_is_one_way_and_write_once() {
    let user_id = Uuid::new_v4();
    let state = state();
    state
        .preferences
        .put(NotificationPreferences::defaults_for(user_id));
    let app = app!(state);

    let record = state
        .dispatcher
        .send(request_for(user_id, vec![NotificationChannel::InApp]))
        .await
        .unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/notifications/{}/read", record.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["updated"], json!(true));

    let read_at = state
        .notifications
        .get(record.id)
        .unwrap()
        .channel_state
        .read_at;
    assert!(read_at.is_some());

    // Second call is a no-op; read_at keeps its first value
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/notifications/{}/read", record.id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["updated"], json!(false));
    assert_eq!(
        state
            .notifications
            .get(record.id)
            .unwrap()
            .channel_state
            .read_at,
        read_at
    );
}

#[actix_web::test]
async fn marking_an_unknown_notification_read_is_404() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/notifications/{}/read", Uuid::new_v4()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
async fn test_dispatch_endpoint_runs_the_full_pipeline() {
    let user_id = Uuid::new_v4();
    let state = state();
    state
        .preferences
        .put(NotificationPreferences::defaults_for(user_id));
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/test")
        .set_json(json!({
            "user_id": user_id,
            "notification_type": "budget_alert",
            "title": "Heads up",
            "message": "Dining budget at 90%",
            "channels": ["in_app", "push"]
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("sent"));
    assert_eq!(state.notifications.len(), 1);
}

#[actix_web::test]
async fn test_dispatch_rejects_unknown_channels() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/test")
        .set_json(json!({
            "user_id": Uuid::new_v4(),
            "notification_type": "budget_alert",
            "title": "t",
            "message": "m",
            "channels": ["carrier_pigeon"]
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn preference_roundtrip_creates_then_partially_updates() {
    let user_id = Uuid::new_v4();
    let state = state();
    let app = app!(state);

    // No record yet
    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/preferences/{}", user_id))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);

    // PUT provisions from defaults, applying only the quiet hours section
    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/preferences/{}", user_id))
        .set_json(json!({
            "quiet_hours": {
                "enabled": true,
                "start": "23:00",
                "end": "07:00",
                "timezone": "America/New_York"
            }
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["quiet_hours"]["enabled"], json!(true));
    assert_eq!(body["data"]["email"]["enabled"], json!(true));

    let stored = state
        .preferences
        .find_by_user(user_id)
        .await
        .unwrap()
        .unwrap();
    assert!(stored.quiet_hours.enabled);
    assert_eq!(stored.quiet_hours.timezone, "America/New_York");
}

#[actix_web::test]
async fn preference_update_rejects_bad_quiet_hours() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/preferences/{}", Uuid::new_v4()))
        .set_json(json!({
            "quiet_hours": {
                "enabled": true,
                "start": "25:61",
                "end": "07:00",
                "timezone": "UTC"
            }
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn device_registration_roundtrip() {
    let user_id = Uuid::new_v4();
    let state = state();
    let app = app!(state);

    let token = "d".repeat(64);
    let req = test::TestRequest::post()
        .uri("/api/v1/devices/register")
        .set_json(json!({
            "user_id": user_id,
            "token": token,
            "platform": "ios"
        }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["success"], json!(true));

    let tokens = state
        .preferences
        .active_device_tokens(user_id)
        .await
        .unwrap();
    assert_eq!(tokens.len(), 1);
    assert_eq!(tokens[0].platform, "ios");

    let req = test::TestRequest::post()
        .uri("/api/v1/devices/unregister")
        .set_json(json!({ "user_id": user_id, "token": token }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let tokens = state
        .preferences
        .active_device_tokens(user_id)
        .await
        .unwrap();
    assert!(tokens.is_empty());
}

#[actix_web::test]
async fn device_registration_rejects_malformed_tokens() {
    let state = state();
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/v1/devices/register")
        .set_json(json!({
            "user_id": Uuid::new_v4(),
            "token": "short",
            "platform": "android"
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
}

#[actix_web::test]
async fn mark_all_read_clears_the_unread_count() {
    let user_id = Uuid::new_v4();
    let state = state();
    state
        .preferences
        .put(NotificationPreferences::defaults_for(user_id));
    let app = app!(state);

    for _ in 0..2 {
        state
            .dispatcher
            .send(request_for(user_id, vec![NotificationChannel::InApp]))
            .await
            .unwrap();
    }
    assert_eq!(state.notifications.unread_count(user_id).await.unwrap(), 2);

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/notifications/user/{}/read-all", user_id))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["updated"], json!(2));
    assert_eq!(state.notifications.unread_count(user_id).await.unwrap(), 0);
}
