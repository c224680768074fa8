use crate::{errors::AppError, models::{Author, Campground}};
use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

/// Header carrying the authenticated user's id, set by the upstream auth gate.
pub const USER_ID_HEADER: &str = "x-user-id";
pub const USERNAME_HEADER: &str = "x-username";

/// The user an upstream gateway has already authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: Uuid,
    pub username: String,
}

impl AuthenticatedUser {
    /// Snapshot stored as a campground's author.
    pub fn as_author(&self) -> Author {
        Author {
            id: self.id,
            username: self.username.clone(),
        }
    }

    /// Only the author may edit or delete a campground.
    pub fn ensure_owner(&self, campground: &Campground) -> Result<(), AppError> {
        if campground.author.id == self.id {
            Ok(())
        } else {
            tracing::warn!(user_id = %self.id, campground_id = %campground.id, "Rejected change by non-owner");
            Err(AppError::Forbidden)
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = header(parts, USER_ID_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USER_ID_HEADER)))?;
        let id = Uuid::parse_str(id).map_err(|e| AppError::Unauthorized(format!("invalid user id: {}", e)))?;
        let username = header(parts, USERNAME_HEADER)
            .ok_or_else(|| AppError::Unauthorized(format!("missing {} header", USERNAME_HEADER)))?
            .to_string();
        Ok(AuthenticatedUser { id, username })
    }
}
