use async_trait::async_trait;
use axum::{extract::FromRequestParts, http::request::Parts};
use tracing::warn;

use super::repo_types::User;
use super::session::Session;
use crate::error::AppError;
use crate::state::AppState;

/// The user behind the session cookie, if any.
pub struct CurrentUser(pub Option<User>);

#[async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let session = match Session::from_request_parts(parts, state).await {
            Ok(s) => s,
            Err(never) => match never {},
        };
        let Some(user_id) = session.user_id() else {
            return Ok(CurrentUser(None));
        };
        let user = User::find_by_id(&state.db, user_id).await?;
        if user.is_none() {
            warn!(user_id, "session refers to a missing user");
        }
        Ok(CurrentUser(user))
    }
}

/// Requires a logged-in user; otherwise redirects to the login page with `next` set.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        user.map(AuthUser).ok_or_else(|| AppError::Unauthorized {
            next: Some(parts.uri.path().to_string()),
        })
    }
}
