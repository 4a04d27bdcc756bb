use crate::error::{ApiResponse, ServiceResult};
use crate::middleware::UserId;
use crate::services::{NewListing, ProductService};
/// Listing and favorite handlers
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct CreateListingPayload {
    pub name: String,
    pub price: i64,
    pub image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdatePricePayload {
    pub price: i64,
}

#[derive(Debug, Deserialize)]
pub struct ReservePayload {
    pub reserved: bool,
}

/// POST /api/v1/products
pub async fn create_listing(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
    req: web::Json<CreateListingPayload>,
) -> ServiceResult<HttpResponse> {
    let req = req.into_inner();
    let product = service
        .create_listing(
            user.0,
            NewListing {
                name: req.name,
                price: req.price,
                image_url: req.image_url,
            },
        )
        .await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(product)))
}

/// GET /api/v1/products/{id}
pub async fn get_product(
    service: web::Data<Arc<ProductService>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let product = service.get_product(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(product)))
}

/// POST /api/v1/products/{id}/favorite
pub async fn add_favorite(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let product = service.add_favorite(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(product)))
}

/// DELETE /api/v1/products/{id}/favorite
pub async fn remove_favorite(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let product = service.remove_favorite(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(product)))
}

/// PUT /api/v1/products/{id}/price
pub async fn update_price(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
    path: web::Path<Uuid>,
    req: web::Json<UpdatePricePayload>,
) -> ServiceResult<HttpResponse> {
    let product = service
        .update_price(path.into_inner(), user.0, req.price)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(product)))
}

/// POST /api/v1/products/{id}/sold
pub async fn mark_sold(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let product = service.mark_sold(path.into_inner(), user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(product)))
}

/// PUT /api/v1/products/{id}/reserved
pub async fn set_reserved(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
    path: web::Path<Uuid>,
    req: web::Json<ReservePayload>,
) -> ServiceResult<HttpResponse> {
    let product = service
        .set_reserved(path.into_inner(), user.0, req.reserved)
        .await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(product)))
}

/// Products the caller has favorited
///
/// GET /api/v1/products/favorites
pub async fn my_favorites(
    service: web::Data<Arc<ProductService>>,
    user: UserId,
) -> ServiceResult<HttpResponse> {
    let products = service.favorites_of(user.0).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(products)))
}

/// GET /api/v1/products/seller/{seller_id}
pub async fn seller_listings(
    service: web::Data<Arc<ProductService>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let products = service.listings_of(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(products)))
}

pub fn register_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1/products")
            .route("", web::post().to(create_listing))
            .route("/favorites", web::get().to(my_favorites))
            .route("/seller/{seller_id}", web::get().to(seller_listings))
            .route("/{id}", web::get().to(get_product))
            .route("/{id}/favorite", web::post().to(add_favorite))
            .route("/{id}/favorite", web::delete().to(remove_favorite))
            .route("/{id}/price", web::put().to(update_price))
            .route("/{id}/sold", web::post().to(mark_sold))
            .route("/{id}/reserved", web::put().to(set_reserved)),
    );
}
