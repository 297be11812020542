//! Argon2id credentials. Hashing is CPU-bound, so both directions run on the blocking pool.

use anyhow::Context;
use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::rngs::OsRng;
use tokio::task::spawn_blocking;

fn hash_blocking(plain: &[u8]) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(plain, &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow::anyhow!("argon2 hash: {e}"))
}

fn verify_blocking(plain: &[u8], stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored password hash: {e}"))?;
    Ok(Argon2::default().verify_password(plain, &parsed).is_ok())
}

/// PHC string with a fresh random salt.
pub async fn hash_password(plain: &str) -> anyhow::Result<String> {
    let plain = plain.as_bytes().to_vec();
    spawn_blocking(move || hash_blocking(&plain))
        .await
        .context("password hashing task")?
}

/// `Ok(false)` on mismatch; `Err` only when the stored hash cannot be parsed.
pub async fn verify_password(plain: &str, stored: &str) -> anyhow::Result<bool> {
    let plain = plain.as_bytes().to_vec();
    let stored = stored.to_owned();
    spawn_blocking(move || verify_blocking(&plain, &stored))
        .await
        .context("password verification task")?
}
