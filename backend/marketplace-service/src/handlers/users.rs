use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::UserService;
/// Profile handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ProfilePayload {
    pub display_name: String,
    pub photo_url: Option<String>,
}

/// PUT /api/v1/users/me
pub async fn upsert_profile(
    service: web::Data<Arc<UserService>>,
    user: UserId,
    req: web::Json<ProfilePayload>,
) -> ServiceResult<HttpResponse> {
    let req = req.into_inner();
    let profile = service
        .upsert_profile(user.0, &req.display_name, req.photo_url)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(profile)))
}

/// GET /api/v1/users/{id}
pub async fn get_profile(
    service: web::Data<Arc<UserService>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let profile = service.get_profile(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(profile)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/users")
            .route("/me", web::put().to(upsert_profile))
            .route("/{id}", web::get().to(get_profile)),
    );
}
