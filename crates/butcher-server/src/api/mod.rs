mod auth;
mod categories;
mod meat_types;
mod orders;
mod products;
mod settings;
mod uploads;
mod users;
mod whatsapp;

use std::{path::PathBuf, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{header, HeaderName, HeaderValue, Method, StatusCode},
    response::IntoResponse,
    routing::{delete, get, patch, post, put},
    Extension, Json, Router,
};
use butcher_core::{AppConfig, ValidationError};
use butcher_notify::Notifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::auth::JwtKeys;
use crate::middleware::{
    enforce_rate_limit, request_id, require_admin, require_user, RateLimitState, RequestId,
};

/// Most images accepted by one multi-file upload.
pub(crate) const MAX_IMAGES_PER_UPLOAD: usize = 5;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub jwt: JwtKeys,
    pub notifier: Arc<dyn Notifier>,
    pub uploads: UploadSettings,
}

/// Where product images are written and how their public URLs are built.
#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub dir: PathBuf,
    pub public_base_url: String,
    pub max_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn from_config(pool: PgPool, config: &AppConfig, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            pool,
            jwt: JwtKeys::new(&config.jwt_secret, config.jwt_ttl_hours),
            notifier,
            uploads: UploadSettings {
                dir: config.upload_dir.clone(),
                public_base_url: config.public_base_url.trim_end_matches('/').to_owned(),
                max_bytes: config.max_upload_bytes,
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

/// Body for endpoints that only acknowledge an action.
#[derive(Debug, Serialize)]
pub(crate) struct MessageData {
    pub message: String,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl<T: Serialize> ApiResponse<T> {
    pub(crate) fn json(request_id: String, data: T) -> Json<Self> {
        Json(Self {
            data,
            meta: ResponseMeta::new(request_id),
        })
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }

    pub(crate) fn not_found(request_id: &str, what: &str) -> Self {
        Self::new(request_id, "not_found", format!("{what} not found"))
    }

    pub(crate) fn validation(request_id: &str, message: impl Into<String>) -> Self {
        Self::new(request_id, "validation_error", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "payload_too_large" => StatusCode::PAYLOAD_TOO_LARGE,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            "upstream_error" => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(crate) fn map_db_error(request_id: String, error: &butcher_db::DbError) -> ApiError {
    if matches!(error, butcher_db::DbError::NotFound) {
        return ApiError::new(request_id, "not_found", "record not found");
    }
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(crate) fn map_validation_error(request_id: &str, error: &ValidationError) -> ApiError {
    ApiError::validation(request_id, error.to_string())
}

/// Deserializes a PATCH field so that an explicit `null` becomes
/// `Some(None)` while an absent field stays `None` (with `#[serde(default)]`).
#[allow(clippy::option_option)]
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn build_cors(origin: Option<&str>) -> CorsLayer {
    let allow_origin = match origin.map(HeaderValue::from_str) {
        Some(Ok(value)) => AllowOrigin::exact(value),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "invalid CORS origin; allowing any origin");
            AllowOrigin::from(Any)
        }
        None => AllowOrigin::from(Any),
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn public_router(rate_limit: RateLimitState) -> Router<AppState> {
    let credentials = Router::new()
        .route("/api/v1/auth/register", post(auth::register))
        .route("/api/v1/auth/login", post(auth::login))
        .layer(axum::middleware::from_fn_with_state(
            rate_limit,
            enforce_rate_limit,
        ));

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/categories", get(categories::list_categories))
        .route("/api/v1/categories/{id}", get(categories::get_category))
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/products/{id}", get(products::get_product))
        .route(
            "/api/v1/products/{id}/meat-types",
            get(meat_types::list_for_product),
        )
        .route("/api/v1/settings", get(settings::get_settings))
        .route("/api/v1/orders/quote", post(orders::quote_order))
        .merge(credentials)
}

fn user_router(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/auth/me", get(auth::me))
        .route("/api/v1/orders", post(orders::create_order))
        .route("/api/v1/orders/mine", get(orders::list_my_orders))
        .route("/api/v1/orders/{id}", get(orders::get_order))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_user,
        ))
}

fn admin_router(state: &AppState) -> Router<AppState> {
    // Room for the multipart framing on top of the image payloads.
    let upload_limit = state
        .uploads
        .max_bytes
        .saturating_mul(MAX_IMAGES_PER_UPLOAD)
        .saturating_add(64 * 1024);

    let uploads = Router::new()
        .route("/api/v1/uploads/image", post(uploads::upload_image))
        .route("/api/v1/uploads/images", post(uploads::upload_images))
        .layer(DefaultBodyLimit::max(upload_limit));

    Router::new()
        .route("/api/v1/categories", post(categories::create_category))
        .route(
            "/api/v1/categories/{id}",
            put(categories::update_category).delete(categories::delete_category),
        )
        .route("/api/v1/products", post(products::create_product))
        .route(
            "/api/v1/products/{id}",
            put(products::update_product).delete(products::delete_product),
        )
        .route(
            "/api/v1/products/{id}/toggle-availability",
            patch(products::toggle_availability),
        )
        .route("/api/v1/meat-types", post(meat_types::create_meat_type))
        .route(
            "/api/v1/meat-types/{id}",
            put(meat_types::update_meat_type).delete(meat_types::delete_meat_type),
        )
        .route(
            "/api/v1/settings/exchange-rate",
            put(settings::update_legacy_rate),
        )
        .route(
            "/api/v1/settings/exchange-rates",
            put(settings::update_exchange_rates),
        )
        .route(
            "/api/v1/settings/min-order-amount",
            put(settings::update_min_order_amounts),
        )
        .route(
            "/api/v1/settings/delivery-fee",
            put(settings::update_delivery_fee),
        )
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/pending-count", get(orders::pending_count))
        .route("/api/v1/orders/{id}", delete(orders::delete_order))
        .route("/api/v1/orders/{id}/status", put(orders::update_status))
        .route("/api/v1/users", get(users::list_users))
        .route("/api/v1/users/{id}/ban", put(users::ban_user))
        .route("/api/v1/users/{id}/unban", put(users::unban_user))
        .route("/api/v1/whatsapp/test", post(whatsapp::send_test_message))
        .merge(uploads)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    state.clone(),
                    require_user,
                ))
                .layer(axum::middleware::from_fn(require_admin)),
        )
}

pub fn build_app(state: AppState, rate_limit: RateLimitState, cors_origin: Option<&str>) -> Router {
    let uploaded_files = ServeDir::new(&state.uploads.dir);

    Router::new()
        .merge(public_router(rate_limit))
        .merge(user_router(&state))
        .merge(admin_router(&state))
        .nest_service("/uploads", uploaded_files)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors(cors_origin))
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match butcher_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

/// Login and registration: 20 attempts per minute for each client address.
pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(20, Duration::from_secs(60))
}

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod tests;
