use axum::{
    extract::{Query, State},
    response::{IntoResponse, Redirect},
    routing::get,
    Form, Router,
};
use serde_json::json;
use tracing::instrument;

use super::claims::FlashLevel;
use super::dto::{CredentialsForm, NextQuery};
use super::extractors::CurrentUser;
use super::services::{self, safe_next};
use super::session::Session;
use crate::error::{login_url, AppError};
use crate::pages::render_with_session;
use crate::state::AppState;

const AFTER_LOGIN: &str = "/face";

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(login_page).post(login))
        .route("/signup", get(signup_page).post(signup))
        .route("/logout", get(logout))
}

#[instrument(skip_all)]
pub async fn login_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
    Query(q): Query<NextQuery>,
) -> Result<impl IntoResponse, AppError> {
    let next = safe_next(q.next.as_deref());
    render_with_session(
        &state,
        session,
        "login",
        user.as_ref(),
        json!({
            "next": next,
            "next_encoded": next.map(|n| urlencoding::encode(n).into_owned()),
        }),
    )
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    mut session: Session,
    Query(q): Query<NextQuery>,
    Form(form): Form<CredentialsForm>,
) -> Result<impl IntoResponse, AppError> {
    let next = safe_next(q.next.as_deref());
    let target = match services::login(&state.db, &form.email, &form.password).await {
        Ok(user) => {
            session.login(user.id);
            next.unwrap_or(AFTER_LOGIN).to_string()
        }
        Err(AppError::Unauthorized { .. }) => {
            session.flash(FlashLevel::Error, "Invalid credentials");
            login_url(next)
        }
        Err(e) => return Err(e),
    };
    Ok((session.into_cookie()?, Redirect::to(&target)))
}

#[instrument(skip_all)]
pub async fn signup_page(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    render_with_session(&state, session, "signup", user.as_ref(), json!({}))
}

#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    mut session: Session,
    Form(form): Form<CredentialsForm>,
) -> Result<impl IntoResponse, AppError> {
    let target = match services::signup(&state.db, &form.email, &form.password).await {
        Ok(user) => {
            session.login(user.id);
            session.flash(FlashLevel::Info, "Account created");
            AFTER_LOGIN
        }
        Err(e @ (AppError::Conflict(_) | AppError::BadRequest(_))) => {
            session.flash(FlashLevel::Error, e.to_string());
            "/signup"
        }
        Err(e) => return Err(e),
    };
    Ok((session.into_cookie()?, Redirect::to(target)))
}

#[instrument(skip_all)]
pub async fn logout(mut session: Session) -> Result<impl IntoResponse, AppError> {
    session.clear();
    Ok((session.into_cookie()?, Redirect::to("/")))
}
