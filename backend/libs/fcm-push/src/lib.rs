/// FCM Push Library
///
/// Firebase Cloud Messaging (HTTP v1) client used by the marketplace service
/// to deliver chat and activity pushes to web and Android devices.
///
/// It handles:
/// - OAuth2 token generation from a Google service account
/// - Access token caching with refresh one minute before expiry
/// - Per-token message delivery with click-through links
/// - Classification of delivery errors into "token is dead" vs. everything else

pub mod client;
pub mod errors;
pub mod models;

pub use client::FcmClient;
pub use errors::FcmError;
pub use models::{FcmSendResult, PushMessage, ServiceAccountKey};
