pub mod bid_service;
pub mod conversation_service;
pub mod message_service;
pub mod notification_service;
pub mod product_service;
pub mod review_service;
pub mod templates;
pub mod user_service;

pub use bid_service::BidService;
pub use conversation_service::{ChatHeader, ConversationService};
pub use message_service::MessageService;
pub use notification_service::{NewNotification, NotificationService};
pub use product_service::{NewListing, ProductService};
pub use review_service::ReviewService;
pub use user_service::UserService;
