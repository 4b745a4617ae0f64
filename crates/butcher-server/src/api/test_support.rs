//! Shared fixtures for router tests.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use butcher_core::hash_password;
use butcher_db::{NewUser, UserRow};
use butcher_notify::{Delivery, EmailMessage, Notifier, NotifyError};
use tower::ServiceExt;

use super::{build_app, AppState, UploadSettings};
use crate::auth::JwtKeys;
use crate::middleware::RateLimitState;

pub(crate) const TEST_PASSWORD: &str = "butcher@123";

/// Notifier that records every message instead of sending it.
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub emails: Mutex<Vec<(String, EmailMessage)>>,
    pub whatsapp: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl RecordingNotifier {
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn email_subjects(&self) -> Vec<String> {
        self.emails
            .lock()
            .expect("emails lock")
            .iter()
            .map(|(_, message)| message.subject.clone())
            .collect()
    }

    pub(crate) fn whatsapp_bodies(&self) -> Vec<String> {
        self.whatsapp
            .lock()
            .expect("whatsapp lock")
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_email(&self, to: &str, message: &EmailMessage) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::NotConfigured("email"));
        }
        self.emails
            .lock()
            .expect("emails lock")
            .push((to.to_owned(), message.clone()));
        Ok(())
    }

    async fn send_whatsapp(&self, to: &str, body: &str) -> Result<Delivery, NotifyError> {
        if self.fail {
            return Err(NotifyError::Api {
                status: 500,
                message: "provider down".to_owned(),
            });
        }
        self.whatsapp
            .lock()
            .expect("whatsapp lock")
            .push((to.to_owned(), body.to_owned()));
        Ok(Delivery::Logged)
    }
}

pub(crate) struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub notifier: Arc<RecordingNotifier>,
}

pub(crate) async fn test_app(pool: sqlx::PgPool) -> TestApp {
    test_app_with(pool, RecordingNotifier::default()).await
}

pub(crate) async fn test_app_with(pool: sqlx::PgPool, notifier: RecordingNotifier) -> TestApp {
    build_test_app(
        pool,
        notifier,
        RateLimitState::new(1_000, std::time::Duration::from_secs(60)),
    )
    .await
}

pub(crate) async fn test_app_with_rate_limit(pool: sqlx::PgPool, max_requests: usize) -> TestApp {
    build_test_app(
        pool,
        RecordingNotifier::default(),
        RateLimitState::new(max_requests, std::time::Duration::from_secs(60)),
    )
    .await
}

async fn build_test_app(
    pool: sqlx::PgPool,
    notifier: RecordingNotifier,
    rate_limit: RateLimitState,
) -> TestApp {
    butcher_db::seed_defaults(&pool).await.expect("seed settings");

    let notifier = Arc::new(notifier);
    let state = AppState {
        pool,
        jwt: JwtKeys::new("test-secret-for-router-tests", 1),
        notifier: notifier.clone(),
        uploads: UploadSettings {
            dir: std::env::temp_dir().join(format!("butcher-test-{}", uuid::Uuid::new_v4())),
            public_base_url: "http://localhost:5001".to_owned(),
            max_bytes: 1024 * 1024,
        },
    };
    let router = build_app(state.clone(), rate_limit, None);
    TestApp {
        router,
        state,
        notifier,
    }
}

async fn insert_user(pool: &sqlx::PgPool, email: &str, mobile: &str, admin: bool) -> UserRow {
    let password_hash = hash_password(TEST_PASSWORD).expect("hash password");
    let user = NewUser {
        first_name: "Hussein",
        last_name: "Haidar",
        father_name: "Ali",
        email,
        mobile,
        password_hash: &password_hash,
    };
    if admin {
        butcher_db::upsert_admin(pool, &user).await.expect("insert admin")
    } else {
        butcher_db::create_user(pool, &user).await.expect("insert customer")
    }
}

pub(crate) async fn seed_customer(pool: &sqlx::PgPool, email: &str, mobile: &str) -> UserRow {
    insert_user(pool, email, mobile, false).await
}

pub(crate) async fn seed_admin(pool: &sqlx::PgPool) -> UserRow {
    insert_user(pool, "admin@butcher.test", "70000000", true).await
}

pub(crate) fn token_for(state: &AppState, user: &UserRow) -> String {
    state.jwt.issue(user.id, user.role()).expect("issue token")
}

/// Build a request with an optional bearer token and JSON body.
pub(crate) fn request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Tag a request with the peer address the server would have recorded.
pub(crate) fn from_client(mut req: Request<Body>, ip: [u8; 4]) -> Request<Body> {
    req.extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((ip, 50_000))));
    req
}

const BOUNDARY: &str = "butcher-test-boundary";

/// One file part of a hand-built multipart body.
pub(crate) struct FilePart<'a> {
    pub field: &'a str,
    pub filename: &'a str,
    pub content_type: &'a str,
    pub bytes: Vec<u8>,
}

/// Build an authenticated `multipart/form-data` POST.
pub(crate) fn multipart_request(uri: &str, token: &str, parts: &[FilePart<'_>]) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                part.field, part.filename, part.content_type
            )
            .as_bytes(),
        );
        body.extend_from_slice(&part.bytes);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("multipart request")
}

/// Send one request through the router and decode the JSON envelope.
pub(crate) async fn send(router: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = router.clone().oneshot(req).await.expect("response");
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body bytes");
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).expect("json parse")
    };
    (status, json)
}
