use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::NotificationService;
/// Notification inbox handlers
use actix_web::{web, HttpResponse};
use std::sync::Arc;

/// Unexpired notifications, newest first
///
/// GET /api/v1/notifications
pub async fn list_notifications(
    service: web::Data<Arc<NotificationService>>,
    user: UserId,
) -> ServiceResult<HttpResponse> {
    let notifications = service.list(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(notifications)))
}

/// GET /api/v1/notifications/unread-count
pub async fn unread_count(
    service: web::Data<Arc<NotificationService>>,
    user: UserId,
) -> ServiceResult<HttpResponse> {
    let count = service.unread_count(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "unread": count }))))
}

/// POST /api/v1/notifications/{id}/read
pub async fn mark_as_read(
    service: web::Data<Arc<NotificationService>>,
    user: UserId,
    path: web::Path<String>,
) -> ServiceResult<HttpResponse> {
    service.mark_as_read(&path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "success": true }))))
}

/// POST /api/v1/notifications/read-all
pub async fn mark_all_read(
    service: web::Data<Arc<NotificationService>>,
    user: UserId,
) -> ServiceResult<HttpResponse> {
    let updated = service.mark_all_read(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "updated": updated }))))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/notifications")
            .route("", web::get().to(list_notifications))
            .route("/unread-count", web::get().to(unread_count))
            .route("/read-all", web::post().to(mark_all_read))
            .route("/{id}/read", web::post().to(mark_as_read)),
    );
}
