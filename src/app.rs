use std::net::SocketAddr;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use crate::{auth, history, prompt, trend};

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

async fn root() -> &'static str {
    "TrendBits API"
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(prompt::router())
                .merge(history::router())
                .merge(trend::router()),
        )
        .route("/health", get(health))
        .route("/", get(root))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let latency_ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, latency_ms, "response");
                        } else {
                            tracing::info!(%status, latency_ms, "response");
                        }
                    },
                ),
        )
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::JwtKeys;
    use crate::state::testing::test_config;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use http_body_util::BodyExt;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use tower::ServiceExt;

    async fn call(app: Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str, bearer: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(token) = bearer {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn app() -> Router {
        build_app(AppState::fake("not json"))
    }

    #[tokio::test]
    async fn health_is_ok() {
        let (status, body) = call(app(), get("/health", None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn register_rejects_invalid_input_before_storage() {
        let req = json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "email": "not-an-email", "password": "pw123456" }),
        );
        let (status, body) = call(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
        assert_eq!(body["title"], "Validation Error");

        let req = json_request(
            Method::POST,
            "/api/auth/register",
            json!({ "email": "a@x.com", "password": "short" }),
        );
        let (status, _) = call(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn login_rejects_a_blank_password_before_storage() {
        let req = json_request(
            Method::POST,
            "/api/auth/login",
            json!({ "email": "a@x.com", "password": "        " }),
        );
        let (status, body) = call(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["title"], "Validation Error");
    }

    #[tokio::test]
    async fn malformed_json_uses_the_envelope() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = call(app(), req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn profile_requires_a_token() {
        let (status, body) = call(app(), get("/api/auth/profile", None)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["title"], "Authentication Required");

        let (status, body) = call(app(), get("/api/prompt/history", Some("garbage"))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["title"], "Invalid Session");
    }

    #[tokio::test]
    async fn expired_token_is_reported_as_such() {
        let cfg = test_config();
        let claims = crate::auth::claims::Claims {
            user_id: uuid::Uuid::new_v4(),
            email: "a@x.com".into(),
            iat: 1_000,
            exp: 2_000,
            iss: cfg.jwt.issuer.clone(),
            aud: cfg.jwt.audience.clone(),
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(cfg.jwt.secret.as_bytes()),
        )
        .unwrap();
        let (status, body) = call(app(), get("/api/auth/validate", Some(&token))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["title"], "Session Expired");
    }

    #[tokio::test]
    async fn validate_echoes_claims() {
        let keys = JwtKeys::from_config(&test_config().jwt);
        let user_id = uuid::Uuid::new_v4();
        let token = keys.sign_access(user_id, "a@x.com").unwrap();
        let (status, body) = call(app(), get("/api/auth/validate", Some(&token))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["user_id"], user_id.to_string());
        assert_eq!(body["data"]["email"], "a@x.com");
    }

    #[tokio::test]
    async fn unreachable_database_is_a_generic_500() {
        let req = json_request(Method::POST, "/api/prompt/summary", json!({ "prompt": "AI" }));
        let (status, body) = call(app(), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["title"], "Service Unavailable");
        assert!(!body.to_string().contains("127.0.0.1"));
    }

    #[tokio::test]
    async fn generate_requires_the_cron_secret() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/trend/generate")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(app(), req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unusable_model_output_is_an_ai_error() {
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/trend/generate")
            .header("x-cron-secret", "cron")
            .body(Body::empty())
            .unwrap();
        let (status, body) = call(app(), req).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["title"], "AI Generation Error");
        assert!(!body.to_string().contains("not json"));
    }

    mod pg {
        use super::*;
        use crate::auth::repo::pg_tests::test_pool;
        use crate::db::Database;
        use crate::history::repo::TrendHistoryRow;
        use crate::mail::LogMailer;
        use crate::state::testing::CannedAi;
        use std::sync::Arc;

        async fn pg_app(ai_reply: &str) -> (Router, sqlx::PgPool) {
            let pool = test_pool().await;
            let mut config = test_config();
            config.db.url = std::env::var("TEST_DATABASE_URL").unwrap();
            config.db.acquire_timeout_ms = 5_000;
            let db = Database::lazy(config.db.clone()).unwrap();
            let state = AppState::from_parts(
                db,
                Arc::new(config),
                Arc::new(CannedAi(ai_reply.to_string())),
                Arc::new(LogMailer),
            );
            (build_app(state), pool)
        }

        fn with_bearer(mut req: Request<Body>, token: &str) -> Request<Body> {
            req.headers_mut().insert(
                header::AUTHORIZATION,
                format!("Bearer {token}").parse().unwrap(),
            );
            req
        }

        async fn register_and_login(app: &Router) -> (String, uuid::Uuid, String) {
            let email = format!("u{}@example.com", uuid::Uuid::new_v4().simple());
            let req = json_request(
                Method::POST,
                "/api/auth/register",
                json!({ "email": email, "password": "pw123456" }),
            );
            let (status, _) = call(app.clone(), req).await;
            assert_eq!(status, StatusCode::CREATED);

            let req = json_request(
                Method::POST,
                "/api/auth/login",
                json!({ "email": email, "password": "pw123456" }),
            );
            let (status, body) = call(app.clone(), req).await;
            assert_eq!(status, StatusCode::OK);
            let token = body["data"]["access_token"].as_str().unwrap().to_string();
            let id = body["data"]["user"]["id"].as_str().unwrap().parse().unwrap();
            (token, id, email)
        }

        #[tokio::test]
        #[ignore = "needs TEST_DATABASE_URL"]
        async fn account_walkthrough_rejects_a_short_username() {
            let (app, _pool) = pg_app("unused").await;
            let (token, user_id, email) = register_and_login(&app).await;

            let (status, body) = call(app.clone(), get("/api/auth/profile", Some(&token))).await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(body["data"]["id"], user_id.to_string());

            let req = with_bearer(
                json_request(Method::PUT, "/api/auth/profile/username", json!({ "username": "ab" })),
                &token,
            );
            let (status, body) = call(app.clone(), req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["title"], "Validation Error");

            let req = json_request(
                Method::POST,
                "/api/auth/login",
                json!({ "email": email, "password": "   " }),
            );
            let (status, _) = call(app, req).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
        }

        #[tokio::test]
        #[ignore = "needs TEST_DATABASE_URL"]
        async fn rejected_summary_writes_no_history() {
            let reply = json!({
                "headline": "h",
                "summary": "s",
                "key_points": ["k"],
                "references": []
            })
            .to_string();
            let (app, pool) = pg_app(&reply).await;
            let (token, user_id, _) = register_and_login(&app).await;
            let before = TrendHistoryRow::count_for_user(&pool, user_id).await.unwrap();

            let req = with_bearer(
                json_request(Method::POST, "/api/prompt/summary", json!({ "prompt": "AI" })),
                &token,
            );
            let (status, body) = call(app, req).await;
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body["title"], "AI Summary Error");

            let after = TrendHistoryRow::count_for_user(&pool, user_id).await.unwrap();
            assert_eq!(before, after);
        }
    }
}
