/// Device token management handlers
use std::sync::Arc;

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiResponse;
use crate::error::AppError;
use crate::services::channels::push::is_valid_token_format;
use crate::store::PreferenceStore;

const KNOWN_PLATFORMS: [&str; 3] = ["ios", "android", "web"];

/// Register device token request
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RegisterDevicePayload {
    pub user_id: Uuid,
    pub token: String,
    pub platform: String, // "ios", "android", "web"
}

/// Unregister device token request
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UnregisterDevicePayload {
    pub user_id: Uuid,
    pub token: String,
}

/// Register a device token for push delivery
///
/// POST /api/v1/devices/register
pub async fn register_device(
    store: web::Data<Arc<dyn PreferenceStore>>,
    req: web::Json<RegisterDevicePayload>,
) -> Result<HttpResponse, AppError> {
    if !is_valid_token_format(&req.token) {
        return Err(AppError::Validation("malformed device token".to_string()));
    }
    let platform = req.platform.to_lowercase();
    if !KNOWN_PLATFORMS.contains(&platform.as_str()) {
        return Err(AppError::Validation(format!(
            "unknown platform '{}'",
            req.platform
        )));
    }

    let device_id = store
        .register_device_token(req.user_id, &req.token, &platform)
        .await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
        "device_id": device_id,
        "success": true
    }))))
}

/// Unregister a device token
///
/// POST /api/v1/devices/unregister
pub async fn unregister_device(
    store: web::Data<Arc<dyn PreferenceStore>>,
    req: web::Json<UnregisterDevicePayload>,
) -> Result<HttpResponse, AppError> {
    store.remove_device_token(req.user_id, &req.token).await?;

    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
        "success": true
    }))))
}

/// Register routes
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/devices")
            .route("/register", web::post().to(register_device))
            .route("/unregister", web::post().to(unregister_device)),
    );
}
