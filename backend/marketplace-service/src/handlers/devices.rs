use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::UserService;
/// Device token management handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct DeviceTokenPayload {
    pub token: String,
}

/// POST /api/v1/devices/register
pub async fn register_device(
    service: web::Data<Arc<UserService>>,
    user: UserId,
    req: web::Json<DeviceTokenPayload>,
) -> ServiceResult<HttpResponse> {
    service.register_device_token(user.0, &req.token).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "success": true }))))
}

/// POST /api/v1/devices/unregister
pub async fn unregister_device(
    service: web::Data<Arc<UserService>>,
    user: UserId,
    req: web::Json<DeviceTokenPayload>,
) -> ServiceResult<HttpResponse> {
    service.unregister_device_token(user.0, &req.token).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "success": true }))))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/devices")
            .route("/register", web::post().to(register_device))
            .route("/unregister", web::post().to(unregister_device)),
    );
}
