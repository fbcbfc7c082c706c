use axum::{
    extract::{FromRef, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde_json::Value;
use time::OffsetDateTime;
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        claims::Claims,
        dto::{
            LoginRequest, LoginResponse, PublicUser, RegisterRequest, RegisteredUser,
            RequestResetPassword, ResetPasswordRequest, ResetTokenStatus, UpdateUsernameRequest,
            VerifyResetTokenQuery,
        },
        extractors::AuthUser,
        jwt::JwtKeys,
        password::{hash_password_blocking, verify_password_blocking},
        repo_types::User,
        reset::{digest_token, generate_reset_token},
        services::{require_email, require_new_password, validate_username},
    },
    db::DbError,
    error::ApiError,
    extract::{JsonBody, QueryParams},
    mail::{password_reset_email, reset_link},
    response::{done, success, Envelope},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/validate", get(validate))
        .route("/auth/request-reset-password", post(request_reset_password))
        .route("/auth/verify-reset-token", get(verify_reset_token))
        .route("/auth/reset-password", post(reset_password))
}

pub fn profile_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/profile", get(profile))
        .route("/auth/profile/username", put(update_username))
}

fn email_taken() -> ApiError {
    ApiError::conflict(
        "Registration Failed",
        "An account with this email already exists",
    )
}

fn username_taken() -> ApiError {
    ApiError::conflict("Username Taken", "This username is already in use")
}

fn invalid_credentials() -> ApiError {
    ApiError::unauthenticated("Invalid Credentials", "Invalid email or password")
}

fn invalid_reset_token() -> ApiError {
    ApiError::bad_request(
        "Invalid Token",
        "This reset link is invalid or has already been used",
    )
}

/// Maps a unique violation on insert/update to the matching 409.
fn uniqueness_conflict(err: DbError, context: &'static str) -> ApiError {
    if err.is_unique_violation() {
        return match err.constraint() {
            Some(c) if c.contains("username") => username_taken(),
            _ => email_taken(),
        };
    }
    ApiError::database(context, err)
}

fn trimmed(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterRequest>,
) -> Result<(StatusCode, Json<Envelope<RegisteredUser>>), ApiError> {
    let email = require_email(payload.email.as_deref())?;
    let password = require_new_password(payload.password.as_deref())?;
    let username = trimmed(payload.username.as_deref())
        .map(validate_username)
        .transpose()?;

    let email_ref = email.as_str();
    let existing = state
        .db
        .run(|pool| async move { User::find_by_email(&pool, email_ref).await })
        .await
        .map_err(|e| ApiError::database("Failed to create account", e))?;
    if existing.is_some() {
        warn!(email = %email, "email already registered");
        return Err(email_taken());
    }

    if let Some(name) = username.as_deref() {
        let taken = state
            .db
            .run(|pool| async move { User::username_taken(&pool, name, None).await })
            .await
            .map_err(|e| ApiError::database("Failed to create account", e))?;
        if taken {
            warn!(username = %name, "username already taken");
            return Err(username_taken());
        }
    }

    let hash = hash_password_blocking(password, state.config.security.bcrypt_cost)
        .await
        .map_err(|e| ApiError::internal("Failed to create account", e))?;

    let (hash_ref, username_ref) = (hash.as_str(), username.as_deref());
    let user = state
        .db
        .run(|pool| async move { User::create(&pool, email_ref, hash_ref, username_ref).await })
        .await
        .map_err(|e| uniqueness_conflict(e, "Failed to create account"))?;

    info!(user_id = %user.id, email = %user.email, "user registered");
    Ok((
        StatusCode::CREATED,
        success(
            "Registration Successful",
            "Your account has been created",
            RegisteredUser::from(user),
        ),
    ))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginRequest>,
) -> Result<Json<Envelope<LoginResponse>>, ApiError> {
    let email = require_email(payload.email.as_deref())?;
    let password = payload.password.unwrap_or_default();
    if password.trim().is_empty() {
        return Err(ApiError::validation("Password is required"));
    }

    let email_ref = email.as_str();
    let user = state
        .db
        .run(|pool| async move { User::find_by_email(&pool, email_ref).await })
        .await
        .map_err(|e| ApiError::database("Failed to sign in", e))?
        .ok_or_else(|| {
            warn!(email = %email, "login unknown email");
            invalid_credentials()
        })?;

    let ok = verify_password_blocking(password, user.password_hash.clone())
        .await
        .map_err(|e| ApiError::internal("Failed to sign in", e))?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(invalid_credentials());
    }

    let keys = JwtKeys::from_ref(&state);
    let access_token = keys
        .sign_access(user.id, &user.email)
        .map_err(|e| ApiError::internal("Failed to sign in", e))?;

    info!(user_id = %user.id, "user logged in");
    Ok(success(
        "Login Successful",
        "Welcome back",
        LoginResponse {
            access_token,
            user: PublicUser::from(user),
        },
    ))
}

#[instrument(skip_all, fields(user_id = %claims.user_id))]
pub async fn validate(AuthUser(claims): AuthUser) -> Json<Envelope<Claims>> {
    success("Token Valid", "Your session is active", claims)
}

#[instrument(skip(state, payload))]
pub async fn request_reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RequestResetPassword>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let email = require_email(payload.email.as_deref())?;

    let email_ref = email.as_str();
    let user = state
        .db
        .run(|pool| async move { User::find_by_email(&pool, email_ref).await })
        .await
        .map_err(|e| ApiError::database("Failed to process reset request", e))?
        .ok_or_else(|| {
            ApiError::not_found("User Not Found", "No account found with this email address")
        })?;

    let token = generate_reset_token(state.config.security.reset_token_ttl_minutes);
    let digest = token.digest();
    let (user_id, digest_ref, expires_at) = (user.id, digest.as_str(), token.expires_at);
    state
        .db
        .run(|pool| async move {
            User::set_reset_token(&pool, user_id, digest_ref, expires_at).await
        })
        .await
        .map_err(|e| ApiError::database("Failed to process reset request", e))?;

    let link = reset_link(&state.config.webapp_url, &token.token);
    state
        .mailer
        .send(password_reset_email(&user.email, &link))
        .await
        .map_err(|e| ApiError::internal("Failed to send reset email", e))?;

    info!(user_id = %user.id, "password reset requested");
    Ok(done(
        "Reset Email Sent",
        "Check your email for a link to reset your password",
    ))
}

#[instrument(skip_all)]
pub async fn verify_reset_token(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<VerifyResetTokenQuery>,
) -> Result<Json<Envelope<ResetTokenStatus>>, ApiError> {
    let token = trimmed(query.token.as_deref())
        .ok_or_else(|| ApiError::validation("Reset token is required"))?;
    let digest = digest_token(token);

    let digest_ref = digest.as_str();
    let user = state
        .db
        .run(|pool| async move { User::find_by_reset_token(&pool, digest_ref).await })
        .await
        .map_err(|e| ApiError::database("Failed to verify reset token", e))?
        .ok_or_else(invalid_reset_token)?;

    let expires_at = user.reset_token_expires.ok_or_else(invalid_reset_token)?;
    if expires_at <= OffsetDateTime::now_utc() {
        warn!(user_id = %user.id, "expired reset token presented");
        return Err(ApiError::bad_request(
            "Token Expired",
            "This reset link has expired. Please request a new one",
        ));
    }

    Ok(success(
        "Token Valid",
        "Reset token is valid",
        ResetTokenStatus {
            valid: true,
            expires_at,
        },
    ))
}

#[instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<ResetPasswordRequest>,
) -> Result<Json<Envelope<Value>>, ApiError> {
    let token = trimmed(payload.token.as_deref())
        .ok_or_else(|| ApiError::validation("Reset token is required"))?;
    let password = require_new_password(payload.password.as_deref())?;
    let digest = digest_token(token);

    let hash = hash_password_blocking(password, state.config.security.bcrypt_cost)
        .await
        .map_err(|e| ApiError::internal("Failed to reset password", e))?;

    let (digest_ref, hash_ref) = (digest.as_str(), hash.as_str());
    let user_id = state
        .db
        .run(|pool| async move { User::consume_reset_token(&pool, digest_ref, hash_ref).await })
        .await
        .map_err(|e| ApiError::database("Failed to reset password", e))?
        .ok_or_else(|| {
            ApiError::bad_request(
                "Invalid Token",
                "This reset link is invalid or has expired",
            )
        })?;

    info!(%user_id, "password reset");
    Ok(done(
        "Password Reset",
        "Your password has been reset. You can now sign in",
    ))
}

#[instrument(skip_all, fields(user_id = %claims.user_id))]
pub async fn profile(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
) -> Result<Json<Envelope<PublicUser>>, ApiError> {
    let user_id = claims.user_id;
    let user = state
        .db
        .run(|pool| async move { User::find_by_id(&pool, user_id).await })
        .await
        .map_err(|e| ApiError::database("Failed to load profile", e))?
        .ok_or_else(|| ApiError::not_found("User Not Found", "Your account could not be found"))?;

    Ok(success(
        "Profile Retrieved",
        "Successfully retrieved your profile",
        PublicUser::from(user),
    ))
}

#[instrument(skip_all, fields(user_id = %claims.user_id))]
pub async fn update_username(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    JsonBody(payload): JsonBody<UpdateUsernameRequest>,
) -> Result<Json<Envelope<PublicUser>>, ApiError> {
    let username = trimmed(payload.username.as_deref())
        .ok_or_else(|| ApiError::validation("Username is required"))
        .and_then(validate_username)?;
    let user_id = claims.user_id;

    let name = username.as_str();
    let taken = state
        .db
        .run(|pool| async move { User::username_taken(&pool, name, Some(user_id)).await })
        .await
        .map_err(|e| ApiError::database("Failed to update username", e))?;
    if taken {
        warn!(username = %username, "username already taken");
        return Err(username_taken());
    }

    let user = state
        .db
        .run(|pool| async move { User::update_username(&pool, user_id, name).await })
        .await
        .map_err(|e| uniqueness_conflict(e, "Failed to update username"))?
        .ok_or_else(|| ApiError::not_found("User Not Found", "Your account could not be found"))?;

    info!(%user_id, username = %username, "username updated");
    Ok(success(
        "Username Updated",
        "Your username has been updated",
        PublicUser::from(user),
    ))
}
