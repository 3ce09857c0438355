//! Request identity extraction.
//!
//! Authentication itself happens upstream (gateway or edge proxy); requests
//! arrive with the verified user identifier in a trusted header. Handlers
//! take [`AuthUser`] as an extractor and never read user identity from the
//! request body or query string.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::errors::ServiceError;

pub const USER_HEADER: &str = "x-authenticated-user";

/// The authenticated user identifier for the current request.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get(USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ServiceError::Unauthorized("missing authenticated user".into()))?;
        Ok(AuthUser(user.to_string()))
    }
}
