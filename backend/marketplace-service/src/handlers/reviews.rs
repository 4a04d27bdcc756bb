use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::ReviewService;
/// Review ledger handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SubmitReviewPayload {
    pub conversation_id: Uuid,
    pub rating: i32,
    pub comment: String,
}

/// POST /api/v1/reviews
pub async fn submit_review(
    service: web::Data<Arc<ReviewService>>,
    user: UserId,
    req: web::Json<SubmitReviewPayload>,
) -> ServiceResult<HttpResponse> {
    let review = service
        .submit_review(req.conversation_id, user.0, req.rating, &req.comment)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(review)))
}

/// GET /api/v1/reviews/user/{user_id}
pub async fn list_reviews(
    service: web::Data<Arc<ReviewService>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let reviews = service.reviews_for_user(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(reviews)))
}

/// GET /api/v1/reviews/user/{user_id}/summary
pub async fn rating_summary(
    service: web::Data<Arc<ReviewService>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let summary = service.rating_summary(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(summary)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/reviews")
            .route("", web::post().to(submit_review))
            .route("/user/{user_id}", web::get().to(list_reviews))
            .route("/user/{user_id}/summary", web::get().to(rating_summary)),
    );
}
