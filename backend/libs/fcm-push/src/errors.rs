use thiserror::Error;

/// FCM error codes that mean the registration token will never work again.
const DEAD_TOKEN_CODES: &[&str] = &["UNREGISTERED", "INVALID_ARGUMENT", "SENDER_ID_MISMATCH"];

/// FCM Client Error Types
#[derive(Error, Debug)]
pub enum FcmError {
    #[error("Failed to read service account key: {0}")]
    KeyReadError(String),

    #[error("Failed to parse private key: {0}")]
    KeyParseError(String),

    #[error("Failed to encode JWT: {0}")]
    JwtEncodeError(String),

    #[error("Failed to get access token: {0}")]
    TokenError(String),

    #[error("Token request failed with status: {0}")]
    TokenRequestFailed(String),

    #[error("FCM send request failed: {0}")]
    SendRequestError(String),

    #[error("Failed to parse FCM response: {0}")]
    ResponseParseError(String),

    /// Error reported by the FCM API: HTTP status plus the FCM error code
    /// (`UNREGISTERED`, `QUOTA_EXCEEDED`, ...) when one was present.
    #[error("FCM API error: {status} - {code}: {message}")]
    ApiError {
        status: u16,
        code: String,
        message: String,
    },
}

impl FcmError {
    /// True when the device token should be dropped from the user's token set.
    ///
    /// Only `UNREGISTERED`-class codes qualify; quota, availability and auth
    /// failures are transient from the token's point of view.
    pub fn is_token_invalid(&self) -> bool {
        match self {
            FcmError::ApiError { code, status, .. } => {
                DEAD_TOKEN_CODES.contains(&code.as_str()) || (*status == 404 && code.is_empty())
            }
            _ => false,
        }
    }

    /// Short code used for logging and metrics labels.
    pub fn code(&self) -> &str {
        match self {
            FcmError::ApiError { code, .. } if !code.is_empty() => code.as_str(),
            FcmError::ApiError { .. } => "API_ERROR",
            FcmError::SendRequestError(_) => "TRANSPORT",
            FcmError::ResponseParseError(_) => "BAD_RESPONSE",
            _ => "AUTH",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(status: u16, code: &str) -> FcmError {
        FcmError::ApiError {
            status,
            code: code.to_string(),
            message: String::new(),
        }
    }

    #[test]
    fn test_unregistered_is_invalid() {
        assert!(api(404, "UNREGISTERED").is_token_invalid());
        assert!(api(400, "INVALID_ARGUMENT").is_token_invalid());
        assert!(api(404, "").is_token_invalid());
    }

    #[test]
    fn test_transient_errors_keep_token() {
        assert!(!api(429, "QUOTA_EXCEEDED").is_token_invalid());
        assert!(!api(503, "UNAVAILABLE").is_token_invalid());
        assert!(!api(500, "INTERNAL").is_token_invalid());
        assert!(!FcmError::SendRequestError("timeout".into()).is_token_invalid());
    }

    #[test]
    fn test_code_labels() {
        assert_eq!(api(404, "UNREGISTERED").code(), "UNREGISTERED");
        assert_eq!(api(500, "").code(), "API_ERROR");
        assert_eq!(FcmError::TokenError("x".into()).code(), "AUTH");
    }
}
