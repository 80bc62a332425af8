use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppError;
use crate::models::{
    NotificationChannel, NotificationPriority, NotificationRequest, NotificationType,
};
use crate::services::Dispatcher;
use crate::store::NotificationStore;

const DEFAULT_PAGE_SIZE: u32 = 20;
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Request to dispatch a notification directly, bypassing domain triggers
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SendNotificationPayload {
    pub user_id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: String,
    pub payload: Option<serde_json::Value>,
    pub channels: Option<Vec<String>>,
    pub priority: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub category: Option<String>,
}

/// List a user's notifications, newest first
///
/// GET /api/v1/notifications/user/{user_id}
pub async fn list_notifications(
    store: web::Data<Arc<dyn NotificationStore>>,
    path: web::Path<Uuid>,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let page = query.page.unwrap_or(1).max(1);
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);

    let notifications = store.list_for_user(user_id, page, limit).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notifications)))
}

/// Count of delivered-but-unread in-app notifications
///
/// GET /api/v1/notifications/user/{user_id}/unread-count
pub async fn unread_count(
    store: web::Data<Arc<dyn NotificationStore>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let count = store.unread_count(user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "count": count }))))
}

/// Mark a notification as read; read_at is written only on the first call
///
/// PUT /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    store: web::Data<Arc<dyn NotificationStore>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let notification_id = path.into_inner();

    let updated = store.mark_read(notification_id).await?;
    if !updated && store.find_by_id(notification_id).await?.is_none() {
        return Err(AppError::NotFound(format!(
            "notification {} not found",
            notification_id
        )));
    }

    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "updated": updated }))))
}

/// Mark all of a user's notifications as read
///
/// PUT /api/v1/notifications/user/{user_id}/read-all
pub async fn mark_all_read(
    store: web::Data<Arc<dyn NotificationStore>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let updated = store.mark_all_read(user_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "updated": updated }))))
}

/// Dispatch a notification through the full preference/quiet-hours pipeline
///
/// POST /api/v1/notifications/test
pub async fn send_test_notification(
    dispatcher: web::Data<Arc<Dispatcher>>,
    req: web::Json<SendNotificationPayload>,
) -> Result<HttpResponse, AppError> {
    let payload = req.into_inner();
    let channels = parse_channels(payload.channels.as_deref())?;

    let request = NotificationRequest {
        user_id: payload.user_id,
        notification_type: NotificationType::parse(&payload.notification_type),
        title: payload.title,
        message: payload.message,
        payload: payload.payload,
        channels,
        priority: NotificationPriority::parse(payload.priority.as_deref().unwrap_or("normal")),
        scheduled_for: payload.scheduled_for,
        source: payload.source,
        category: payload.category,
    };

    let record = dispatcher.send(request).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(record)))
}

fn parse_channels(raw: Option<&[String]>) -> Result<Vec<NotificationChannel>, AppError> {
    let Some(raw) = raw else {
        return Ok(NotificationChannel::ALL.to_vec());
    };
    if raw.is_empty() {
        return Err(AppError::Validation(
            "channels must not be empty".to_string(),
        ));
    }
    raw.iter()
        .map(|s| {
            NotificationChannel::parse(s)
                .ok_or_else(|| AppError::Validation(format!("unknown channel '{}'", s)))
        })
        .collect()
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("/test", web::post().to(send_test_notification))
            .route("/user/{user_id}", web::get().to(list_notifications))
            .route(
                "/user/{user_id}/unread-count",
                web::get().to(unread_count),
            )
            .route("/user/{user_id}/read-all", web::put().to(mark_all_read))
            .route("/{id}/read", web::put().to(mark_as_read)),
    );
}
