use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// User record in the database.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,                     // unique user ID
    pub email: String,                // normalized email
    #[serde(skip_serializing)]
    pub password_hash: String,        // bcrypt hash, not exposed in JSON
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub reset_token: Option<String>,  // sha256 of the mailed token
    #[serde(skip_serializing)]
    pub reset_token_expires: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}
