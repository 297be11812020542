use anyhow::Context;
use sqlx::SqlitePool;
use time::OffsetDateTime;

use super::repo_types::AttendanceRecord;

pub async fn insert_record(
    db: &SqlitePool,
    user_id: i64,
    image_path: Option<&str>,
) -> anyhow::Result<AttendanceRecord> {
    let record = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        INSERT INTO attendance (user_id, image_path, created_at)
        VALUES (?1, ?2, ?3)
        RETURNING id, user_id, image_path, created_at
        "#,
    )
    .bind(user_id)
    .bind(image_path) // Option<&str> → NULL allowed
    .bind(OffsetDateTime::now_utc())
    .fetch_one(db)
    .await
    .context("insert attendance record")?;
    Ok(record)
}

/// Newest first; ids are AUTOINCREMENT so they follow insertion order.
pub async fn list_recent_by_user(
    db: &SqlitePool,
    user_id: i64,
    limit: i64,
) -> anyhow::Result<Vec<AttendanceRecord>> {
    let rows = sqlx::query_as::<_, AttendanceRecord>(
        r#"
        SELECT id, user_id, image_path, created_at
          FROM attendance
         WHERE user_id = ?1
         ORDER BY id DESC
         LIMIT ?2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await
    .context("list attendance by user")?;
    Ok(rows)
}

#[cfg(test)]
pub async fn count_by_user(db: &SqlitePool, user_id: i64) -> anyhow::Result<i64> {
    let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM attendance WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(db)
        .await?;
    Ok(n)
}
