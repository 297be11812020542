use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use tracing::{debug, instrument};

use crate::auth::extractors::AuthUser;
use crate::error::AppError;
use crate::pages::content_type_for;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/uploads/*filename", get(uploaded_file))
}

/// Raw image download. Any logged-in user may fetch any stored file.
#[instrument(skip_all, fields(user_id = user.id, %filename))]
pub async fn uploaded_file(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let Some(body) = state.storage.get_object(&filename).await? else {
        debug!(%filename, "upload not found");
        return Err(AppError::NotFound);
    };
    Ok(([(header::CONTENT_TYPE, content_type_for(&filename))], body))
}
