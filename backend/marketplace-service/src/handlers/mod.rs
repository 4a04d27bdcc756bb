/// HTTP handlers for marketplace-service API
pub mod bids;
pub mod conversations;
pub mod devices;
pub mod notifications;
pub mod products;
pub mod reviews;
pub mod users;

use actix_web::web;

/// Mount every API scope.
pub fn register_routes(cfg: &mut web::ServiceConfig) {
    conversations::register_routes(cfg);
    bids::register_routes(cfg);
    reviews::register_routes(cfg);
    products::register_routes(cfg);
    notifications::register_routes(cfg);
    devices::register_routes(cfg);
    users::register_routes(cfg);
}
