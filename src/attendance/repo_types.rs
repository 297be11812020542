use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// One check-in: who submitted and which stored image backs it.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    pub image_path: Option<String>,
    pub created_at: OffsetDateTime,
}
