use crate::auth::repo_types::User;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

const USER_COLUMNS: &str = "id, email, password_hash, username, reset_token, \
                            reset_token_expires, created_at, updated_at";

impl User {
    /// Find a user by normalized email.
    pub async fn find_by_email(db: &PgPool, email: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(db)
            .await
    }

    pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(db)
            .await
    }

    pub async fn exists(db: &PgPool, id: Uuid) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(db)
            .await
    }

    /// Whether `username` belongs to someone other than `except`.
    pub async fn username_taken(
        db: &PgPool,
        username: &str,
        except: Option<Uuid>,
    ) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM users
                WHERE lower(username) = lower($1)
                  AND ($2::uuid IS NULL OR id <> $2)
            )
            "#,
        )
        .bind(username)
        .bind(except)
        .fetch_one(db)
        .await
    }

    /// Create a new user with hashed password.
    pub async fn create(
        db: &PgPool,
        email: &str,
        password_hash: &str,
        username: Option<&str>,
    ) -> sqlx::Result<User> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, email, password_hash, username)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(password_hash)
        .bind(username)
        .fetch_one(db)
        .await
    }

    pub async fn update_username(db: &PgPool, id: Uuid, username: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET username = $2, updated_at = now()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(username)
        .fetch_optional(db)
        .await
    }

    /// Stores the digest and expiry together; returns false for an unknown user.
    pub async fn set_reset_token(
        db: &PgPool,
        id: Uuid,
        token_digest: &str,
        expires_at: OffsetDateTime,
    ) -> sqlx::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE users
            SET reset_token = $2, reset_token_expires = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token_digest)
        .bind(expires_at)
        .execute(db)
        .await?;
        Ok(res.rows_affected() == 1)
    }

    pub async fn find_by_reset_token(db: &PgPool, token_digest: &str) -> sqlx::Result<Option<User>> {
        sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1"
        ))
        .bind(token_digest)
        .fetch_optional(db)
        .await
    }

    /// Sets the new password and clears the token in one statement, so a token can
    /// only ever be consumed once. `None` means unknown or expired token.
    pub async fn consume_reset_token(
        db: &PgPool,
        token_digest: &str,
        password_hash: &str,
    ) -> sqlx::Result<Option<Uuid>> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE users
            SET password_hash = $2,
                reset_token = NULL,
                reset_token_expires = NULL,
                updated_at = now()
            WHERE reset_token = $1 AND reset_token_expires > now()
            RETURNING id
            "#,
        )
        .bind(token_digest)
        .bind(password_hash)
        .fetch_optional(db)
        .await
    }
}
