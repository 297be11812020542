use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use time::macros::format_description;
use tracing::{instrument, warn};

use super::dto::{RecordView, VerifyRequest, VerifyResponse};
use super::repo;
use super::services::submit_verification;
use crate::auth::extractors::AuthUser;
use crate::auth::session::Session;
use crate::error::{ApiError, AppError};
use crate::pages::render_with_session;
use crate::state::AppState;

const RECENT_RECORDS: i64 = 10;

pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/face", get(face_page))
        .route("/success", get(success_page))
}

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/verify", post(verify))
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024)) // 10MB
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn face_page(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    render_with_session(&state, session, "face", Some(&user), json!({}))
}

/// POST /api/verify {"image": "data:image/jpeg;base64,..."}
#[instrument(skip_all, fields(user_id = user.id))]
pub async fn verify(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    body: Result<Json<VerifyRequest>, JsonRejection>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let image = match body {
        Ok(Json(VerifyRequest { image: Some(image) })) => image,
        Ok(_) => return Err(AppError::BadRequest("Invalid image".into()).into()),
        Err(e) => {
            warn!(error = %e, "unreadable verify body");
            return Err(AppError::BadRequest("Invalid image".into()).into());
        }
    };

    submit_verification(&state, user.id, &image).await?;
    Ok(Json(VerifyResponse {
        ok: true,
        redirect: "/success".into(),
    }))
}

#[instrument(skip_all, fields(user_id = user.id))]
pub async fn success_page(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    let rows = repo::list_recent_by_user(&state.db, user.id, RECENT_RECORDS).await?;
    let mut records = Vec::with_capacity(rows.len());
    for r in rows {
        let created_at = r
            .created_at
            .format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second] UTC"))
            .map_err(anyhow::Error::from)?;
        records.push(RecordView {
            image_url: r
                .image_path
                .map(|p| format!("/uploads/{}", urlencoding::encode(&p))),
            created_at,
        });
    }
    render_with_session(&state, session, "success", Some(&user), json!({ "records": records }))
}
