/// Caller identity for marketplace-service
///
/// Authentication happens at the gateway, which forwards the verified user
/// id in `X-User-Id`. Handlers take `UserId` to require it.
use actix_web::{error::ErrorUnauthorized, Error, FromRequest, HttpRequest};
use futures::future::{ready, Ready};
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "X-User-Id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserId(pub Uuid);

impl FromRequest for UserId {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut actix_web::dev::Payload) -> Self::Future {
        let result = req
            .headers()
            .get(USER_ID_HEADER)
            .ok_or_else(|| ErrorUnauthorized("Missing X-User-Id header"))
            .and_then(|h| h.to_str().map_err(|_| ErrorUnauthorized("Invalid user ID")))
            .and_then(|s| Uuid::parse_str(s).map_err(|_| ErrorUnauthorized("Invalid user ID")))
            .map(UserId);
        ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[actix_web::test]
    async fn test_extracts_user_id() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, id.to_string()))
            .to_http_request();
        let user = UserId::extract(&req).await.unwrap();
        assert_eq!(user, UserId(id));
    }

    #[actix_web::test]
    async fn test_rejects_missing_or_malformed_header() {
        let req = TestRequest::default().to_http_request();
        assert!(UserId::extract(&req).await.is_err());

        let req = TestRequest::default()
            .insert_header((USER_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(UserId::extract(&req).await.is_err());
    }
}
