use axum::{async_trait, extract::FromRequestParts, http::request::Parts};

use crate::{domain::models::UserId, routes::ApiError};

/// Header carrying the authenticated user id, set by the auth proxy in front
/// of this service.
pub const USER_HEADER: &str = "x-usagi-user";

/// The caller's identity, trusted as given. Returns 401 when the header is
/// missing or not an integer.
#[derive(Debug, Clone, Copy)]
pub struct CurrentUser(pub UserId);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(USER_HEADER)
            .ok_or_else(|| ApiError::unauthorized("Not authenticated"))?;

        let id = raw
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i32>().ok())
            .ok_or_else(|| ApiError::unauthorized("Invalid user header"))?;

        Ok(CurrentUser(UserId::new(id)))
    }
}
