use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::BidService;
/// Bid negotiation handlers, keyed by conversation
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PlaceBidPayload {
    pub price: i64,
}

/// POST /api/v1/bids/{conversation_id}
pub async fn place_bid(
    service: web::Data<Arc<BidService>>,
    user: UserId,
    path: web::Path<Uuid>,
    req: web::Json<PlaceBidPayload>,
) -> ServiceResult<HttpResponse> {
    let conversation = service
        .place_bid(path.into_inner(), user.0, req.price)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(conversation)))
}

/// POST /api/v1/bids/{conversation_id}/accept
pub async fn accept_bid(
    service: web::Data<Arc<BidService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let conversation = service.accept_bid(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(conversation)))
}

/// POST /api/v1/bids/{conversation_id}/decline
pub async fn decline_bid(
    service: web::Data<Arc<BidService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let conversation = service.decline_bid(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(conversation)))
}

/// POST /api/v1/bids/{conversation_id}/cancel
pub async fn cancel_bid(
    service: web::Data<Arc<BidService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let conversation = service.cancel_bid(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(conversation)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/bids")
            .route("/{conversation_id}", web::post().to(place_bid))
            .route("/{conversation_id}/accept", web::post().to(accept_bid))
            .route("/{conversation_id}/decline", web::post().to(decline_bid))
            .route("/{conversation_id}/cancel", web::post().to(cancel_bid)),
    );
}
