use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::models::{Product, ProductStatus};
use crate::store::{ChangeEvent, DocumentStore, ProductUpdate, WriteBatch, WriteOp};

/// Input for a new listing
#[derive(Debug, Clone)]
pub struct NewListing {
    pub name: String,
    pub price: i64,
    pub image_url: Option<String>,
}

pub struct ProductService {
    store: Arc<dyn DocumentStore>,
}

impl ProductService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn create_listing(&self, seller_id: Uuid, listing: NewListing) -> ServiceResult<Product> {
        let name = listing.name.trim();
        if name.is_empty() {
            return Err(ServiceError::Validation(
                "product name must not be empty".to_string(),
            ));
        }
        validate_price(listing.price)?;

        let mut product = Product::new(seller_id, name, listing.price);
        product.image_url = listing.image_url;
        let id = product.id;

        let events = self
            .store
            .commit(WriteBatch::new().op(WriteOp::CreateProduct(product)))
            .await?;
        info!(product_id = %id, seller_id = %seller_id, "Listing created");
        updated_product(&events, id)
    }

    pub async fn get_product(&self, id: Uuid) -> ServiceResult<Product> {
        self.load(id).await
    }

    /// Idempotent per user: favoriting twice counts once.
    pub async fn add_favorite(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<Product> {
        let product = self.load(product_id).await?;
        if product.seller_id == user_id {
            return Err(ServiceError::Validation(
                "cannot favorite your own listing".to_string(),
            ));
        }
        if product.favorited_by.contains(&user_id) {
            return Ok(product);
        }
        debug!(product_id = %product_id, user_id = %user_id, "Adding favorite");
        self.update(
            product_id,
            ProductUpdate {
                add_favorite: Some(user_id),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn remove_favorite(&self, product_id: Uuid, user_id: Uuid) -> ServiceResult<Product> {
        let product = self.load(product_id).await?;
        if !product.favorited_by.contains(&user_id) {
            return Ok(product);
        }
        debug!(product_id = %product_id, user_id = %user_id, "Removing favorite");
        self.update(
            product_id,
            ProductUpdate {
                remove_favorite: Some(user_id),
                ..Default::default()
            },
        )
        .await
    }

    /// Change the asking price. `original_price` keeps the first listed price.
    pub async fn update_price(
        &self,
        product_id: Uuid,
        seller_id: Uuid,
        price: i64,
    ) -> ServiceResult<Product> {
        validate_price(price)?;
        let product = self.owned(product_id, seller_id).await?;
        if product.is_sold() {
            return Err(ServiceError::Validation(
                "cannot reprice a sold product".to_string(),
            ));
        }
        if product.price == price {
            return Ok(product);
        }
        info!(
            product_id = %product_id,
            old_price = product.price,
            new_price = price,
            "Price updated"
        );
        self.update(
            product_id,
            ProductUpdate {
                price: Some(price),
                ..Default::default()
            },
        )
        .await
    }

    /// Seller closes the sale without a bid; the list price is the final price.
    pub async fn mark_sold(&self, product_id: Uuid, seller_id: Uuid) -> ServiceResult<Product> {
        let product = self.owned(product_id, seller_id).await?;
        if product.is_sold() {
            return Ok(product);
        }
        info!(product_id = %product_id, "Product marked sold");
        self.update(
            product_id,
            ProductUpdate {
                status: Some(Some(ProductStatus::Sold)),
                ..Default::default()
            },
        )
        .await
    }

    /// Toggle the reservation flag. Sold products stay sold.
    pub async fn set_reserved(
        &self,
        product_id: Uuid,
        seller_id: Uuid,
        reserved: bool,
    ) -> ServiceResult<Product> {
        let product = self.owned(product_id, seller_id).await?;
        if product.is_sold() {
            return Err(ServiceError::Validation(
                "product is already sold".to_string(),
            ));
        }
        let status = reserved.then_some(ProductStatus::Reserved);
        if product.status == status {
            return Ok(product);
        }
        self.update(
            product_id,
            ProductUpdate {
                status: Some(status),
                ..Default::default()
            },
        )
        .await
    }

    pub async fn favorites_of(&self, user_id: Uuid) -> ServiceResult<Vec<Product>> {
        self.store.products_favorited_by(user_id).await
    }

    pub async fn listings_of(&self, seller_id: Uuid) -> ServiceResult<Vec<Product>> {
        self.store.products_by_seller(seller_id).await
    }

    async fn update(&self, id: Uuid, update: ProductUpdate) -> ServiceResult<Product> {
        let events = self
            .store
            .commit(WriteBatch::new().op(WriteOp::UpdateProduct { id, update }))
            .await?;
        updated_product(&events, id)
    }

    async fn load(&self, id: Uuid) -> ServiceResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("product {}", id)))
    }

    async fn owned(&self, id: Uuid, seller_id: Uuid) -> ServiceResult<Product> {
        let product = self.load(id).await?;
        if product.seller_id != seller_id {
            return Err(ServiceError::PermissionDenied(format!(
                "product {} belongs to another seller",
                id
            )));
        }
        Ok(product)
    }
}

fn validate_price(price: i64) -> ServiceResult<()> {
    if price <= 0 {
        return Err(ServiceError::Validation(
            "price must be positive".to_string(),
        ));
    }
    Ok(())
}

fn updated_product(events: &[ChangeEvent], id: Uuid) -> ServiceResult<Product> {
    events
        .iter()
        .find_map(|e| match e {
            ChangeEvent::Product(change) => change.after.clone().filter(|p| p.id == id),
            _ => None,
        })
        .ok_or_else(|| ServiceError::Internal(format!("product {} not written", id)))
}
