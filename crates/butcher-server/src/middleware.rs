use std::{
    collections::HashMap,
    net::{IpAddr, Ipv4Addr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant},
};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::AUTHORIZATION, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use butcher_db::UserRow;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::api::{map_db_error, ApiError, AppState};

/// Newtype wrapping a request ID string, stored as a request extension.
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// The authenticated account, inserted by [`require_user`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRow);

#[derive(Debug, Clone, Copy)]
struct RateLimitWindow {
    started_at: Instant,
    count: usize,
}

/// Past this many tracked clients, expired windows are swept on the next hit.
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Fixed-window limiter keyed by client IP address.
#[derive(Debug, Clone)]
pub struct RateLimitState {
    max_requests: usize,
    window: Duration,
    windows: Arc<Mutex<HashMap<IpAddr, RateLimitWindow>>>,
}

impl RateLimitState {
    #[must_use]
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            windows: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Counts one request from `client`; `false` once its window is used up.
    async fn admit(&self, client: IpAddr) -> bool {
        let mut windows = self.windows.lock().await;
        if windows.len() >= MAX_TRACKED_CLIENTS {
            windows.retain(|_, w| w.started_at.elapsed() < self.window);
        }

        let entry = windows.entry(client).or_insert(RateLimitWindow {
            started_at: Instant::now(),
            count: 0,
        });
        if entry.started_at.elapsed() >= self.window {
            entry.started_at = Instant::now();
            entry.count = 0;
        }
        if entry.count >= self.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Peer address recorded by `into_make_service_with_connect_info`.
fn client_ip(req: &Request) -> IpAddr {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip())
}

fn request_id_of(req: &Request) -> String {
    req.extensions()
        .get::<RequestId>()
        .map(|id| id.0.clone())
        .unwrap_or_default()
}

/// Axum middleware that extracts or generates a request ID.
///
/// If the incoming request has an `x-request-id` header, that value is used.
/// Otherwise a new `UUIDv4` is generated. The ID is:
/// - Inserted into request extensions as [`RequestId`]
/// - Set on the response as the `x-request-id` header
pub async fn request_id(mut req: Request, next: Next) -> Response {
    let id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| Uuid::new_v4().to_string(), String::from);

    req.extensions_mut().insert(RequestId(id.clone()));

    let mut res = next.run(req).await;

    if let Ok(val) = HeaderValue::from_str(&id) {
        res.headers_mut().insert("x-request-id", val);
    }

    res
}

/// Validates the bearer JWT and loads the account it names.
///
/// Missing or invalid tokens and deleted accounts get 401; banned accounts
/// get 403.
pub async fn require_user(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let rid = request_id_of(&req);

    let Some(token) = extract_bearer_token(req.headers().get(AUTHORIZATION)) else {
        return ApiError::new(rid, "unauthorized", "no token, authorization denied").into_response();
    };

    let claims = match state.jwt.verify(token) {
        Ok(claims) => claims,
        Err(e) => {
            tracing::debug!(error = %e, "rejected bearer token");
            return ApiError::new(rid, "unauthorized", "token is not valid").into_response();
        }
    };

    let Some(user_id) = claims.user_id() else {
        return ApiError::new(rid, "unauthorized", "token is not valid").into_response();
    };

    let user = match butcher_db::get_user_by_id(&state.pool, user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return ApiError::new(rid, "unauthorized", "token is not valid").into_response();
        }
        Err(e) => return map_db_error(rid, &e).into_response(),
    };

    if user.is_banned {
        tracing::info!(user_id = user.id, "banned account refused");
        return ApiError::new(rid, "forbidden", "account has been banned").into_response();
    }

    req.extensions_mut().insert(CurrentUser(user));
    next.run(req).await
}

/// Must run inside [`require_user`].
pub async fn require_admin(req: Request, next: Next) -> Response {
    let is_admin = req
        .extensions()
        .get::<CurrentUser>()
        .is_some_and(|user| user.0.is_admin());

    if is_admin {
        next.run(req).await
    } else {
        ApiError::new(request_id_of(&req), "forbidden", "admin access required").into_response()
    }
}

/// Middleware enforcing a fixed request-per-window limit for each client.
pub async fn enforce_rate_limit(
    State(rate_limit): State<RateLimitState>,
    req: Request,
    next: Next,
) -> Response {
    let client = client_ip(&req);
    if !rate_limit.admit(client).await {
        tracing::warn!(path = %req.uri().path(), %client, "rate limit exceeded");
        return ApiError::new(request_id_of(&req), "rate_limited", "rate limit exceeded")
            .into_response();
    }

    next.run(req).await
}

fn extract_bearer_token(value: Option<&HeaderValue>) -> Option<&str> {
    value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .filter(|s| !s.trim().is_empty())
}
