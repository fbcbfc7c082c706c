use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{db::DbError, response::failure};

/// Every failure a handler can answer with. Messages here are user-safe; the
/// underlying causes are only logged.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{title}: {message}")]
    Validation {
        title: &'static str,
        message: String,
    },
    #[error("{title}: {message}")]
    Authentication {
        title: &'static str,
        message: String,
    },
    #[error("guest quota of {max_requests} request(s) exhausted")]
    QuotaExceeded { max_requests: i32 },
    #[error("{title}: {message}")]
    NotFound {
        title: &'static str,
        message: String,
    },
    #[error("{title}: {message}")]
    Conflict {
        title: &'static str,
        message: String,
    },
    #[error("ai upstream failure: {detail}")]
    UpstreamAi {
        title: &'static str,
        message: &'static str,
        detail: String,
    },
    #[error("database unavailable after {attempts} attempt(s)")]
    Connectivity { attempts: u32 },
    #[error("{message}: {source:#}")]
    Internal {
        message: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            title: "Validation Error",
            message: message.into(),
        }
    }

    /// 400 with a specific title, for failures that are not plain field validation.
    pub fn bad_request(title: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            title,
            message: message.into(),
        }
    }

    pub fn unauthenticated(title: &'static str, message: impl Into<String>) -> Self {
        Self::Authentication {
            title,
            message: message.into(),
        }
    }

    pub fn not_found(title: &'static str, message: impl Into<String>) -> Self {
        Self::NotFound {
            title,
            message: message.into(),
        }
    }

    pub fn conflict(title: &'static str, message: impl Into<String>) -> Self {
        Self::Conflict {
            title,
            message: message.into(),
        }
    }

    pub fn internal(message: &'static str, source: impl Into<anyhow::Error>) -> Self {
        Self::Internal {
            message,
            source: source.into(),
        }
    }

    /// Storage failure; connectivity keeps its own variant so the attempt count is logged.
    pub fn database(message: &'static str, err: DbError) -> Self {
        match err {
            DbError::Unavailable { attempts, source } => {
                error!(error = %source, attempts, "database unavailable");
                Self::Connectivity { attempts }
            }
            DbError::Query(e) => Self::internal(message, e),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } => StatusCode::BAD_REQUEST,
            ApiError::Authentication { .. } => StatusCode::UNAUTHORIZED,
            ApiError::QuotaExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Conflict { .. } => StatusCode::CONFLICT,
            ApiError::UpstreamAi { .. }
            | ApiError::Connectivity { .. }
            | ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, %status, "request failed");
        } else {
            warn!(error = %self, %status, "request rejected");
        }

        let body = match self {
            ApiError::Validation { title, message }
            | ApiError::Authentication { title, message }
            | ApiError::NotFound { title, message }
            | ApiError::Conflict { title, message } => failure(title, message, None),
            ApiError::QuotaExceeded { max_requests } => failure(
                "Request Limit Reached",
                format!(
                    "You've reached the limit of {max_requests} free prompts. \
                     Please sign up to continue using TrendBits."
                ),
                Some(json!({ "requires_signup": true, "max_requests": max_requests })),
            ),
            ApiError::UpstreamAi { title, message, .. } => failure(title, message, None),
            ApiError::Connectivity { .. } => failure(
                "Service Unavailable",
                "We're having trouble reaching our database. Please try again shortly.",
                None,
            ),
            ApiError::Internal { message, .. } => failure("Internal Server Error", message, None),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn quota_error_asks_for_signup() {
        let (status, v) = body_json(ApiError::QuotaExceeded { max_requests: 2 }).await;
        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(v["status"], "error");
        assert_eq!(v["data"]["requires_signup"], true);
        assert_eq!(v["data"]["max_requests"], 2);
    }

    #[tokio::test]
    async fn internal_error_hides_source() {
        let err = ApiError::internal(
            "Failed to save trend summary",
            anyhow::anyhow!("relation \"trend_history\" does not exist"),
        );
        let (status, v) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(v["message"], "Failed to save trend summary");
        assert!(!v.to_string().contains("does not exist"));
    }

    #[test]
    fn database_errors_keep_connectivity_distinct() {
        let err = ApiError::database(
            "x",
            DbError::Unavailable {
                attempts: 4,
                source: sqlx::Error::PoolTimedOut,
            },
        );
        assert!(matches!(err, ApiError::Connectivity { attempts: 4 }));

        let err = ApiError::database("x", DbError::Query(sqlx::Error::RowNotFound));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(matches!(err, ApiError::Internal { .. }));
    }

    #[test]
    fn status_mapping() {
        assert_eq!(ApiError::validation("x").status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::unauthenticated("Session Expired", "x").status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::not_found("t", "x").status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::conflict("t", "x").status(), StatusCode::CONFLICT);
    }
}
