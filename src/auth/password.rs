use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("hashed password cannot be empty")]
    EmptyHash,
    #[error("bcrypt failure: {0}")]
    Bcrypt(#[from] bcrypt::BcryptError),
}

pub fn hash_password(plain: &str, cost: u32) -> Result<String, PasswordError> {
    if plain.trim().is_empty() {
        return Err(PasswordError::EmptyPassword);
    }
    bcrypt::hash(plain, cost).map_err(|e| {
        error!(error = %e, "bcrypt hash error");
        PasswordError::Bcrypt(e)
    })
}

pub fn verify_password(plain: &str, hash: &str) -> Result<bool, PasswordError> {
    if plain.trim().is_empty() {
        return Err(PasswordError::EmptyPassword);
    }
    if hash.trim().is_empty() {
        return Err(PasswordError::EmptyHash);
    }
    bcrypt::verify(plain, hash).map_err(|e| {
        error!(error = %e, "bcrypt verify error");
        PasswordError::Bcrypt(e)
    })
}

/// Runs `hash_password` on the blocking pool.
pub async fn hash_password_blocking(plain: String, cost: u32) -> anyhow::Result<String> {
    Ok(tokio::task::spawn_blocking(move || hash_password(&plain, cost)).await??)
}

pub async fn verify_password_blocking(plain: String, hash: String) -> anyhow::Result<bool> {
    Ok(tokio::task::spawn_blocking(move || verify_password(&plain, &hash)).await??)
}
