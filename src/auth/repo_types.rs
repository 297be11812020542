use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String, // trimmed, lower-case
    #[serde(skip_serializing)]
    pub password_hash: String, // Argon2 PHC string, not exposed in templates
    pub created_at: OffsetDateTime,
}
