use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::{ConversationService, MessageService};
/// Conversation and chat message handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct StartConversationPayload {
    pub seller_id: Uuid,
    pub product_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SendMessagePayload {
    pub text: String,
}

/// Open (or reopen) the buyer's chat with a seller about a product
///
/// POST /api/v1/conversations
pub async fn start_conversation(
    service: web::Data<Arc<ConversationService>>,
    user: UserId,
    req: web::Json<StartConversationPayload>,
) -> ServiceResult<HttpResponse> {
    let id = service
        .find_or_create_conversation(user.0, req.seller_id, req.product_id)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({
        "conversation_id": id
    }))))
}

/// GET /api/v1/conversations
pub async fn list_conversations(
    service: web::Data<Arc<ConversationService>>,
    user: UserId,
) -> ServiceResult<HttpResponse> {
    let conversations = service.list_conversations(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(conversations)))
}

/// GET /api/v1/conversations/{id}
pub async fn get_conversation(
    service: web::Data<Arc<ConversationService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let conversation = service.get_conversation(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(conversation)))
}

/// GET /api/v1/conversations/{id}/header
pub async fn get_header(
    service: web::Data<Arc<ConversationService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let header = service.chat_header(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(header)))
}

/// POST /api/v1/conversations/{id}/read
pub async fn mark_as_read(
    service: web::Data<Arc<ConversationService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    service.mark_as_read(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "success": true }))))
}

/// POST /api/v1/conversations/{id}/hide
pub async fn hide_conversation(
    service: web::Data<Arc<ConversationService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    service.hide_conversation(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(serde_json::json!({ "success": true }))))
}

/// GET /api/v1/conversations/{id}/messages
pub async fn list_messages(
    service: web::Data<Arc<MessageService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let messages = service.list_messages(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(messages)))
}

/// POST /api/v1/conversations/{id}/messages
pub async fn send_message(
    service: web::Data<Arc<MessageService>>,
    user: UserId,
    path: web::Path<Uuid>,
    req: web::Json<SendMessagePayload>,
) -> ServiceResult<HttpResponse> {
    let message = service
        .send_message(path.into_inner(), user.0, &req.text)
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(message)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/conversations")
            .route("", web::post().to(start_conversation))
            .route("", web::get().to(list_conversations))
            .route("/{id}", web::get().to(get_conversation))
            .route("/{id}/header", web::get().to(get_header))
            .route("/{id}/read", web::post().to(mark_as_read))
            .route("/{id}/hide", web::post().to(hide_conversation))
            .route("/{id}/messages", web::get().to(list_messages))
            .route("/{id}/messages", web::post().to(send_message)),
    );
}
