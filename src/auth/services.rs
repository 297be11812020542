use lazy_static::lazy_static;
use regex::Regex;
use sqlx::SqlitePool;
use tracing::{info, warn};

use super::password::{hash_password, verify_password};
use super::repo_types::User;
use crate::error::AppError;

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Only same-site absolute paths are followed after login.
pub(crate) fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|n| n.starts_with('/') && !n.starts_with("//") && !n.contains('\\'))
}

pub async fn signup(db: &SqlitePool, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    if email.is_empty() || password.is_empty() {
        return Err(AppError::BadRequest("Email and password are required".into()));
    }
    if !is_valid_email(&email) {
        warn!(%email, "invalid email");
        return Err(AppError::BadRequest("Invalid email".into()));
    }

    let hash = hash_password(password).await?;
    let user = User::create(db, &email, &hash).await.inspect_err(|e| {
        if matches!(e, AppError::Conflict(_)) {
            warn!(%email, "email already registered");
        }
    })?;

    info!(user_id = user.id, email = %user.email, "user registered");
    Ok(user)
}

pub async fn login(db: &SqlitePool, email: &str, password: &str) -> Result<User, AppError> {
    let email = normalize_email(email);
    let unauthorized = || AppError::Unauthorized { next: None };

    let Some(user) = User::find_by_email(db, &email).await? else {
        warn!(%email, "login unknown email");
        return Err(unauthorized());
    };
    if !verify_password(password, &user.password_hash).await? {
        warn!(%email, user_id = user.id, "login invalid password");
        return Err(unauthorized());
    }

    info!(user_id = user.id, email = %user.email, "user logged in");
    Ok(user)
}
