//! Favorite counting under concurrent toggles.

mod common;

use common::Harness;
use futures::future::join_all;
use marketplace_service::ServiceError;

#[tokio::test]
async fn test_count_tracks_distinct_favoriters() {
    let h = Harness::new();
    let seller = h.user("Bob").await;
    let product = h.listing(seller, "Kayak", 700).await;

    let mut fans = Vec::new();
    for i in 0..5 {
        fans.push(h.user(&format!("fan-{}", i)).await);
    }

    let adds = fans
        .iter()
        .map(|fan| h.state.products.add_favorite(product.id, *fan));
    for result in join_all(adds).await {
        result.unwrap();
    }

    // Repeats count once
    h.state.products.add_favorite(product.id, fans[0]).await.unwrap();

    let removes = fans[..2]
        .iter()
        .map(|fan| h.state.products.remove_favorite(product.id, *fan));
    for result in join_all(removes).await {
        result.unwrap();
    }
    h.state.products.remove_favorite(product.id, fans[0]).await.unwrap();

    let product = h.state.products.get_product(product.id).await.unwrap();
    assert_eq!(product.favorites, 3);
    assert_eq!(product.favorited_by.len(), 3);
    assert!(fans[2..].iter().all(|f| product.favorited_by.contains(f)));

    let mine = h.state.products.favorites_of(fans[4]).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert!(h.state.products.favorites_of(fans[0]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_listing_ownership() {
    let h = Harness::new();
    let seller = h.user("Bob").await;
    let other = h.user("Mallory").await;
    let product = h.listing(seller, "Tent", 90).await;

    let err = h
        .state
        .products
        .update_price(product.id, other, 10)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::PermissionDenied(_)));

    let reserved = h
        .state
        .products
        .set_reserved(product.id, seller, true)
        .await
        .unwrap();
    assert!(reserved.status.is_some());
    assert!(!reserved.is_sold());

    h.state.products.mark_sold(product.id, seller).await.unwrap();
    let err = h
        .state
        .products
        .update_price(product.id, seller, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let listings = h.state.products.listings_of(seller).await.unwrap();
    assert_eq!(listings.len(), 1);
}
