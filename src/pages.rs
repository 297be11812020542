use std::borrow::Cow;

use axum::{
    extract::{Path, State},
    http::header,
    response::{Html, IntoResponse},
    routing::get,
    Router,
};
use rust_embed::RustEmbed;
use serde_json::{json, Value};
use tracing::{error, instrument};

use crate::auth::claims::Flash;
use crate::auth::extractors::CurrentUser;
use crate::auth::repo_types::User;
use crate::auth::session::{Session, SessionCookie};
use crate::error::AppError;
use crate::state::AppState;

#[derive(RustEmbed)]
#[folder = "assets/static"]
struct StaticAssets;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/static/*path", get(static_asset))
        .route("/health", get(|| async { "ok" }))
}

/// Renders `template` with the shared page context (user, flashes) plus `extra`.
pub fn render(
    state: &AppState,
    template: &str,
    user: Option<&User>,
    flashes: &[Flash],
    extra: Value,
) -> Result<Html<String>, AppError> {
    let mut ctx = json!({
        "user": user.map(|u| json!({ "id": u.id, "email": u.email })),
        "flashes": flashes,
    });
    if let (Some(ctx), Value::Object(extra)) = (ctx.as_object_mut(), extra) {
        ctx.extend(extra);
    }
    let html = state.templates.render(template, &ctx).map_err(|e| {
        error!(error = %e, template, "template render failed");
        anyhow::anyhow!(e)
    })?;
    Ok(Html(html))
}

/// Renders a page and writes back the session with its flashes consumed.
pub fn render_with_session(
    state: &AppState,
    mut session: Session,
    template: &str,
    user: Option<&User>,
    extra: Value,
) -> Result<(SessionCookie, Html<String>), AppError> {
    let flashes = session.take_flashes();
    let html = render(state, template, user, &flashes, extra)?;
    Ok((session.into_cookie()?, html))
}

#[instrument(skip_all)]
async fn index(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    session: Session,
) -> Result<impl IntoResponse, AppError> {
    render_with_session(&state, session, "index", user.as_ref(), json!({}))
}

pub fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpeg" | "jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        _ => "application/octet-stream",
    }
}

async fn static_asset(Path(path): Path<String>) -> Result<impl IntoResponse, AppError> {
    let asset = StaticAssets::get(&path).ok_or(AppError::NotFound)?;
    let body: Cow<'static, [u8]> = asset.data;
    Ok(([(header::CONTENT_TYPE, content_type_for(&path))], body.into_owned()))
}
