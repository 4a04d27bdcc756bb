pub mod conversation;
pub mod message;
pub mod notification;
pub mod product;
pub mod review;
pub mod user;

pub use conversation::{
    BidStatus, Conversation, LastMessage, ParticipantDetails, ProductSnapshot,
};
pub use message::{Message, MessageKind};
pub use notification::{Notification, NotificationType, RelatedData};
pub use product::{Product, ProductStatus};
pub use review::{RatingSummary, Review, ReviewerRole};
pub use user::UserProfile;
