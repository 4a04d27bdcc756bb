use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A push notification addressed to one device token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
    pub image: Option<String>,
    /// Click-through path (e.g. `/chat/{id}`), delivered as `link` in the data
    /// block and as the webpush `fcm_options.link`.
    pub link: Option<String>,
    pub data: HashMap<String, String>,
}

/// FCM Send Result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmSendResult {
    pub message_id: String,
}

/// Firebase Service Account Key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceAccountKey {
    pub project_id: String,
    pub private_key_id: String,
    pub private_key: String,
    pub client_email: String,
    pub client_id: String,
    pub token_uri: String,
}

/// OAuth2 Token Cache
#[derive(Debug, Clone)]
pub(crate) struct TokenCache {
    pub access_token: String,
    pub expires_at: i64,
}

/// JWT Claims for Google OAuth2
#[derive(Debug, Serialize)]
pub(crate) struct JwtClaims {
    pub iss: String,
    pub sub: String,
    pub scope: String,
    pub aud: String,
    pub exp: i64,
    pub iat: i64,
}

/// Google OAuth2 Token Response
#[derive(Debug, Deserialize)]
pub(crate) struct GoogleTokenResponse {
    pub access_token: String,
    pub expires_in: i64,
}

#[derive(Debug, Serialize)]
pub(crate) struct FcmRequest<'a> {
    pub message: FcmMessageBody<'a>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FcmMessageBody<'a> {
    pub token: &'a str,
    pub notification: FcmNotification<'a>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub data: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webpush: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub(crate) struct FcmNotification<'a> {
    pub title: &'a str,
    pub body: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<&'a str>,
}

/// FCM API success response
#[derive(Debug, Deserialize)]
pub(crate) struct FcmApiResponse {
    pub name: Option<String>,
}

/// FCM API error envelope: `{"error": {"code": 404, "status": "NOT_FOUND", "details": [...]}}`
#[derive(Debug, Deserialize)]
pub(crate) struct FcmErrorEnvelope {
    pub error: FcmErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FcmErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub details: Vec<FcmErrorDetail>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct FcmErrorDetail {
    #[serde(rename = "errorCode")]
    pub error_code: Option<String>,
}

impl FcmErrorBody {
    /// The most specific error code available: the FCM `errorCode` detail,
    /// falling back to the canonical status.
    pub fn code(&self) -> String {
        self.details
            .iter()
            .find_map(|d| d.error_code.clone())
            .unwrap_or_else(|| self.status.clone())
    }
}
