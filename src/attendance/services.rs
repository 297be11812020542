use anyhow::Context;
use base64::Engine;
use bytes::Bytes;
use time::{macros::format_description, OffsetDateTime};
use tracing::{info, warn};

use super::repo;
use super::repo_types::AttendanceRecord;
use crate::error::AppError;
use crate::state::AppState;
use crate::storage::PutOutcome;

const DATA_URL_PREFIX: &str = "data:image/";
const MAX_NAME_ATTEMPTS: u32 = 100;

/// Decoded `data:image/<ext>;base64,<data>` payload.
#[derive(Debug)]
pub struct EmbeddedImage {
    pub ext: &'static str,
    pub body: Bytes,
}

fn ext_from_subtype(subtype: &str) -> Option<&'static str> {
    match subtype {
        "jpeg" => Some("jpeg"),
        "jpg" => Some("jpg"),
        "png" => Some("png"),
        "webp" => Some("webp"),
        "gif" => Some("gif"),
        "bmp" => Some("bmp"),
        "heic" => Some("heic"),
        _ => None,
    }
}

fn invalid_image() -> AppError {
    AppError::BadRequest("Invalid image".into())
}

pub fn parse_data_url(data_url: &str) -> Result<EmbeddedImage, AppError> {
    let rest = data_url.strip_prefix(DATA_URL_PREFIX).ok_or_else(invalid_image)?;
    let (header, data) = rest.split_once(',').ok_or_else(invalid_image)?;

    let mut params = header.split(';');
    let subtype = params.next().unwrap_or_default().to_ascii_lowercase();
    let ext = ext_from_subtype(&subtype).ok_or_else(invalid_image)?;
    if !params.any(|p| p.trim().eq_ignore_ascii_case("base64")) {
        return Err(invalid_image());
    }

    let body = base64::engine::general_purpose::STANDARD
        .decode(data.trim())
        .map_err(|_| AppError::BadRequest("Invalid base64 payload".into()))?;
    if body.is_empty() {
        return Err(AppError::BadRequest("Empty image".into()));
    }

    Ok(EmbeddedImage {
        ext,
        body: Bytes::from(body),
    })
}

/// `<YYYYMMDD_HHMMSS>_<user id>[-<n>].<ext>`; `attempt` 0 has no counter.
pub fn upload_file_name(at: OffsetDateTime, user_id: i64, ext: &str, attempt: u32) -> anyhow::Result<String> {
    let stamp = at
        .to_offset(time::UtcOffset::UTC)
        .format(format_description!("[year][month][day]_[hour][minute][second]"))
        .context("format upload timestamp")?;
    Ok(match attempt {
        0 => format!("{stamp}_{user_id}.{ext}"),
        n => format!("{stamp}_{user_id}-{n}.{ext}"),
    })
}

/// Stores the image under a fresh name and returns that name.
async fn store_image(st: &AppState, user_id: i64, image: EmbeddedImage) -> anyhow::Result<String> {
    let now = OffsetDateTime::now_utc();
    for attempt in 0..MAX_NAME_ATTEMPTS {
        let name = upload_file_name(now, user_id, image.ext, attempt)?;
        match st.storage.put_object(&name, image.body.clone()).await? {
            PutOutcome::Created => return Ok(name),
            PutOutcome::AlreadyExists => warn!(%name, "upload name taken, retrying"),
        }
    }
    anyhow::bail!("no free upload name for user {user_id}")
}

/// The check-in stub: keeps the image and logs attendance. No face matching happens here.
pub async fn submit_verification(
    st: &AppState,
    user_id: i64,
    data_url: &str,
) -> Result<AttendanceRecord, AppError> {
    let image = parse_data_url(data_url)?;
    let size = image.body.len();
    let filename = store_image(st, user_id, image).await?;
    let record = match repo::insert_record(&st.db, user_id, Some(&filename)).await {
        Ok(record) => record,
        Err(e) => {
            warn!(user_id, %filename, error = %e, "attendance insert failed, removing stored image");
            if let Err(cleanup) = st.storage.delete_object(&filename).await {
                warn!(%filename, error = %cleanup, "could not remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    info!(user_id, record_id = record.id, %filename, size, "attendance recorded");
    Ok(record)
}
