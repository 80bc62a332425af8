/// Notification preferences handlers
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppError;
use crate::models::{ChannelPreference, NotificationPreferences, QuietHours};
use crate::services::quiet_hours::parse_hhmm;
use crate::store::PreferenceStore;

/// Partial preference update: absent sections are left untouched
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UpdatePreferencesPayload {
    pub email: Option<ChannelPreference>,
    pub push: Option<ChannelPreference>,
    pub in_app: Option<ChannelPreference>,
    pub quiet_hours: Option<QuietHours>,
}

/// Get a user's notification preferences
///
/// GET /api/v1/preferences/{user_id}
pub async fn get_preferences(
    store: web::Data<Arc<dyn PreferenceStore>>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();

    let prefs = store
        .find_by_user(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("no preferences for user {}", user_id)))?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(prefs)))
}

/// Update notification preferences, creating the record if absent
///
/// PUT /api/v1/preferences/{user_id}
pub async fn update_preferences(
    store: web::Data<Arc<dyn PreferenceStore>>,
    path: web::Path<Uuid>,
    req: web::Json<UpdatePreferencesPayload>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let payload = req.into_inner();

    if let Some(quiet_hours) = &payload.quiet_hours {
        validate_quiet_hours(quiet_hours)?;
    }

    let mut prefs = store
        .find_by_user(user_id)
        .await?
        .unwrap_or_else(|| NotificationPreferences::defaults_for(user_id));

    if let Some(email) = payload.email {
        prefs.email = email;
    }
    if let Some(push) = payload.push {
        prefs.push = push;
    }
    if let Some(in_app) = payload.in_app {
        prefs.in_app = in_app;
    }
    if let Some(quiet_hours) = payload.quiet_hours {
        prefs.quiet_hours = quiet_hours;
    }
    prefs.updated_at = Utc::now();

    store.upsert(&prefs).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(prefs)))
}

fn validate_quiet_hours(quiet_hours: &QuietHours) -> Result<(), AppError> {
    if parse_hhmm(&quiet_hours.start).is_none() {
        return Err(AppError::Validation(format!(
            "invalid quiet hours start '{}'",
            quiet_hours.start
        )));
    }
    if parse_hhmm(&quiet_hours.end).is_none() {
        return Err(AppError::Validation(format!(
            "invalid quiet hours end '{}'",
            quiet_hours.end
        )));
    }
    if quiet_hours.timezone.parse::<chrono_tz::Tz>().is_err() {
        return Err(AppError::Validation(format!(
            "unknown timezone '{}'",
            quiet_hours.timezone
        )));
    }
    Ok(())
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/preferences")
            .route("/{user_id}", web::get().to(get_preferences))
            .route("/{user_id}", web::put().to(update_preferences)),
    );
}
