use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::FcmError;
use crate::models::*;

const FCM_SCOPE: &str = "https://www.googleapis.com/auth/firebase.messaging";

/// Firebase Cloud Messaging Client
///
/// Manages OAuth2 token generation, caching, and per-device message delivery.
pub struct FcmClient {
    pub project_id: String,
    credentials: Arc<ServiceAccountKey>,
    token_cache: Arc<Mutex<Option<TokenCache>>>,
    http_client: reqwest::Client,
}

impl ServiceAccountKey {
    /// Load a service-account JSON key from disk.
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, FcmError> {
        let raw = tokio::fs::read_to_string(path.as_ref())
            .await
            .map_err(|e| FcmError::KeyReadError(e.to_string()))?;
        serde_json::from_str(&raw).map_err(|e| FcmError::KeyReadError(e.to_string()))
    }
}

impl FcmClient {
    /// Create new FCM client
    pub fn new(credentials: ServiceAccountKey) -> Self {
        Self {
            project_id: credentials.project_id.clone(),
            credentials: Arc::new(credentials),
            token_cache: Arc::new(Mutex::new(None)),
            http_client: reqwest::Client::new(),
        }
    }

    /// Send one push message.
    ///
    /// Non-2xx responses are decoded into [`FcmError::ApiError`] carrying the
    /// FCM error code so callers can decide whether to drop the token.
    pub async fn send(&self, message: &PushMessage) -> Result<FcmSendResult, FcmError> {
        let access_token = self.get_access_token().await?;

        let request = build_request(message);
        let url = format!(
            "https://fcm.googleapis.com/v1/projects/{}/messages:send",
            self.project_id
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(access_token)
            .json(&request)
            .send()
            .await
            .map_err(|e| FcmError::SendRequestError(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            let body: FcmApiResponse = response
                .json()
                .await
                .map_err(|e| FcmError::ResponseParseError(e.to_string()))?;
            let message_id = body.name.unwrap_or_default();
            debug!(message_id = %message_id, "FCM message accepted");
            return Ok(FcmSendResult { message_id });
        }

        let text = response.text().await.unwrap_or_default();
        Err(parse_api_error(status.as_u16(), &text))
    }

    /// Get access token from service account (with caching)
    async fn get_access_token(&self) -> Result<String, FcmError> {
        let mut cache = self.token_cache.lock().await;
        if let Some(cached) = cache.as_ref() {
            if cached.expires_at > Utc::now().timestamp() + 60 {
                return Ok(cached.access_token.clone());
            }
        }

        let now = Utc::now();
        let claims = JwtClaims {
            iss: self.credentials.client_email.clone(),
            sub: self.credentials.client_email.clone(),
            scope: FCM_SCOPE.to_string(),
            aud: self.credentials.token_uri.clone(),
            exp: (now + Duration::hours(1)).timestamp(),
            iat: now.timestamp(),
        };

        let encoding_key = EncodingKey::from_rsa_pem(self.credentials.private_key.as_bytes())
            .map_err(|e| FcmError::KeyParseError(e.to_string()))?;
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.credentials.private_key_id.clone());
        let assertion = encode(&header, &claims, &encoding_key)
            .map_err(|e| FcmError::JwtEncodeError(e.to_string()))?;

        let params = [
            ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
            ("assertion", assertion.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.credentials.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| FcmError::TokenError(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = %response.status(), "OAuth2 token exchange rejected");
            return Err(FcmError::TokenRequestFailed(response.status().to_string()));
        }

        let token: GoogleTokenResponse = response
            .json()
            .await
            .map_err(|e| FcmError::TokenError(e.to_string()))?;

        *cache = Some(TokenCache {
            access_token: token.access_token.clone(),
            expires_at: Utc::now().timestamp() + token.expires_in,
        });

        Ok(token.access_token)
    }
}

fn build_request(message: &PushMessage) -> FcmRequest<'_> {
    let mut data = message.data.clone();
    if let Some(link) = &message.link {
        data.insert("link".to_string(), link.clone());
    }

    FcmRequest {
        message: FcmMessageBody {
            token: &message.token,
            notification: FcmNotification {
                title: &message.title,
                body: &message.body,
                image: message.image.as_deref(),
            },
            data,
            webpush: message
                .link
                .as_ref()
                .map(|link| serde_json::json!({ "fcm_options": { "link": link } })),
        },
    }
}

fn parse_api_error(status: u16, body: &str) -> FcmError {
    match serde_json::from_str::<FcmErrorEnvelope>(body) {
        Ok(envelope) => FcmError::ApiError {
            status,
            code: envelope.error.code(),
            message: envelope.error.message,
        },
        Err(_) => FcmError::ApiError {
            status,
            code: String::new(),
            message: body.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn message(link: Option<&str>) -> PushMessage {
        PushMessage {
            token: "device-token-1234567890".to_string(),
            title: "New message".to_string(),
            body: "Is this still available?".to_string(),
            image: None,
            link: link.map(str::to_string),
            data: HashMap::new(),
        }
    }

    #[test]
    fn test_request_carries_link_in_data_and_webpush() {
        let msg = message(Some("/chat/abc"));
        let json = serde_json::to_value(build_request(&msg)).unwrap();

        assert_eq!(json["message"]["token"], "device-token-1234567890");
        assert_eq!(json["message"]["data"]["link"], "/chat/abc");
        assert_eq!(json["message"]["webpush"]["fcm_options"]["link"], "/chat/abc");
        assert!(json["message"]["notification"].get("image").is_none());
    }

    #[test]
    fn test_request_without_link_omits_webpush() {
        let json = serde_json::to_value(build_request(&message(None))).unwrap();
        assert!(json["message"].get("webpush").is_none());
        assert!(json["message"].get("data").is_none());
    }

    #[test]
    fn test_parse_unregistered_error() {
        let body = r#"{"error":{"code":404,"message":"Requested entity was not found.","status":"NOT_FOUND","details":[{"@type":"type.googleapis.com/google.firebase.fcm.v1.FcmError","errorCode":"UNREGISTERED"}]}}"#;
        let err = parse_api_error(404, body);
        assert_eq!(err.code(), "UNREGISTERED");
        assert!(err.is_token_invalid());
    }

    #[test]
    fn test_parse_status_only_error() {
        let body = r#"{"error":{"code":503,"message":"busy","status":"UNAVAILABLE"}}"#;
        let err = parse_api_error(503, body);
        assert_eq!(err.code(), "UNAVAILABLE");
        assert!(!err.is_token_invalid());
    }

    #[test]
    fn test_parse_non_json_error() {
        let err = parse_api_error(502, "<html>bad gateway</html>");
        assert!(!err.is_token_invalid());
        assert_eq!(err.code(), "API_ERROR");
    }

    #[test]
    fn test_client_creation() {
        let creds = ServiceAccountKey {
            project_id: "test-project".to_string(),
            private_key_id: "key-id".to_string(),
            private_key: "private-key".to_string(),
            client_email: "test@test.iam.gserviceaccount.com".to_string(),
            client_id: "123456".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };

        let client = FcmClient::new(creds);
        assert_eq!(client.project_id, "test-project");
    }
}
