//! HTTP surface: routing, identity header and error envelopes.

mod common;

use actix_web::{test, web, App};
use common::Harness;
use marketplace_service::handlers;
use marketplace_service::middleware::USER_ID_HEADER;
use serde_json::{json, Value};
use uuid::Uuid;

macro_rules! app {
    ($h:expr) => {{
        let state = $h.state.clone();
        test::init_service(
            App::new()
                .route("/health", web::get().to(|| async { "OK" }))
                .configure(move |cfg| {
                    state.configure(cfg);
                    handlers::register_routes(cfg);
                }),
        )
        .await
    }};
}

#[actix_web::test]
async fn test_health() {
    let h = Harness::new();
    let app = app!(h);
    let req = test::TestRequest::get().uri("/health").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
}

#[actix_web::test]
async fn test_identity_header_required() {
    let h = Harness::new();
    let app = app!(h);
    let req = test::TestRequest::get()
        .uri("/api/v1/conversations")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 401);
}

#[actix_web::test]
async fn test_listing_to_chat_over_http() {
    let h = Harness::new();
    let buyer = h.user("Alice").await;
    let seller = h.user("Bob").await;
    let app = app!(h);

    let req = test::TestRequest::post()
        .uri("/api/v1/products")
        .insert_header((USER_ID_HEADER, seller.to_string()))
        .set_json(json!({ "name": "Camera", "price": 150 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], true);
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri("/api/v1/conversations")
        .insert_header((USER_ID_HEADER, buyer.to_string()))
        .set_json(json!({ "seller_id": seller, "product_id": product_id }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let conversation_id = body["data"]["conversation_id"].as_str().unwrap().to_string();

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/conversations/{}/messages", conversation_id))
        .insert_header((USER_ID_HEADER, seller.to_string()))
        .set_json(json!({ "text": "Still available" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/conversations/{}/messages", conversation_id))
        .insert_header((USER_ID_HEADER, buyer.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let messages = body["data"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1]["text"], "Still available");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/bids/{}", conversation_id))
        .insert_header((USER_ID_HEADER, buyer.to_string()))
        .set_json(json!({ "price": 100 }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["bid_status"], "pending");

    let req = test::TestRequest::post()
        .uri(&format!("/api/v1/bids/{}/accept", conversation_id))
        .insert_header((USER_ID_HEADER, seller.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/conversations/{}/header", conversation_id))
        .insert_header((USER_ID_HEADER, buyer.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["status_line"], "Sold for $100");
}

#[actix_web::test]
async fn test_errors_use_the_envelope() {
    let h = Harness::new();
    let deal = h.deal().await;
    let stranger = h.user("Mallory").await;
    let app = app!(h);

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/conversations/{}", deal.conversation_id))
        .insert_header((USER_ID_HEADER, stranger.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 403);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("Permission denied"));

    let req = test::TestRequest::get()
        .uri(&format!("/api/v1/conversations/{}", Uuid::new_v4()))
        .insert_header((USER_ID_HEADER, stranger.to_string()))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 404);

    let req = test::TestRequest::post()
        .uri("/api/v1/reviews")
        .insert_header((USER_ID_HEADER, deal.buyer.to_string()))
        .set_json(json!({
            "conversation_id": deal.conversation_id,
            "rating": 5,
            "comment": "Lovely camera"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 201);

    let req = test::TestRequest::post()
        .uri("/api/v1/reviews")
        .insert_header((USER_ID_HEADER, deal.buyer.to_string()))
        .set_json(json!({
            "conversation_id": deal.conversation_id,
            "rating": 5,
            "comment": "Lovely camera"
        }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status().as_u16(), 409);
}

#[actix_web::test]
async fn test_notification_inbox_over_http() {
    let mut h = Harness::new();
    let deal = h.deal().await;
    h.settle().await;
    let app = app!(h);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications/unread-count")
        .insert_header((USER_ID_HEADER, deal.seller.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["unread"], 1);

    let req = test::TestRequest::post()
        .uri("/api/v1/notifications/read-all")
        .insert_header((USER_ID_HEADER, deal.seller.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"]["updated"], 1);

    let req = test::TestRequest::get()
        .uri("/api/v1/notifications")
        .insert_header((USER_ID_HEADER, deal.seller.to_string()))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["data"][0]["is_read"], true);
    assert_eq!(body["data"][0]["notification_type"], "new_message");
}
