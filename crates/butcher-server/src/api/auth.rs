//! Account registration, login and the current-user lookup.

use axum::{extract::State, http::StatusCode, Extension, Json};
use butcher_core::validation::{normalize_email, require_text, validate_password};
use butcher_db::{NewUser, UserRow};
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::users::UserItem;
use super::{map_db_error, map_validation_error, ApiError, ApiResponse, AppState};

const NAME_MAX: usize = 100;
const MOBILE_MAX: usize = 30;

#[derive(Debug, Deserialize)]
pub(in crate::api) struct RegisterRequest {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub father_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub mobile: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct SessionData {
    token: String,
    user: UserItem,
}

/// POST /api/v1/auth/register: create a customer account and sign it in.
pub(in crate::api) async fn register(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SessionData>>), ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);

    let first_name = require_text("first_name", &body.first_name, NAME_MAX).map_err(invalid)?;
    let last_name = require_text("last_name", &body.last_name, NAME_MAX).map_err(invalid)?;
    let father_name = require_text("father_name", &body.father_name, NAME_MAX).map_err(invalid)?;
    let mobile = require_text("mobile", &body.mobile, MOBILE_MAX).map_err(invalid)?;
    let email = normalize_email(&body.email).map_err(invalid)?;
    validate_password(&body.password).map_err(invalid)?;

    let (email_taken, mobile_taken) =
        butcher_db::email_or_mobile_taken(&state.pool, &email, &mobile)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
    if email_taken {
        return Err(ApiError::new(
            rid,
            "conflict",
            "a user already exists with this email",
        ));
    }
    if mobile_taken {
        return Err(ApiError::new(
            rid,
            "conflict",
            "a user already exists with this mobile number",
        ));
    }

    let password_hash = butcher_core::hash_password(&body.password).map_err(|e| {
        tracing::error!(error = %e, "password hashing failed");
        ApiError::new(rid, "internal_error", "registration failed")
    })?;

    let row = butcher_db::create_user(
        &state.pool,
        &NewUser {
            first_name: &first_name,
            last_name: &last_name,
            father_name: &father_name,
            email: &email,
            mobile: &mobile,
            password_hash: &password_hash,
        },
    )
    .await
    .map_err(|e| {
        // Lost a race with a concurrent registration for the same email or mobile.
        if e.is_unique_violation() {
            ApiError::new(rid, "conflict", "a user already exists with this email or mobile")
        } else {
            map_db_error(rid.clone(), &e)
        }
    })?;
    tracing::info!(user_id = row.id, "customer registered");

    let session = open_session(&state, rid, row)?;
    Ok((StatusCode::CREATED, ApiResponse::json(req_id.0, session)))
}

/// POST /api/v1/auth/login
pub(in crate::api) async fn login(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<ApiResponse<SessionData>>, ApiError> {
    let rid = &req_id.0;
    let invalid_credentials = || ApiError::new(rid, "unauthorized", "invalid credentials");

    let email = normalize_email(&body.email).map_err(|_| invalid_credentials())?;
    let user = butcher_db::get_user_by_email(&state.pool, &email)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(invalid_credentials)?;

    if !butcher_core::verify_password(&body.password, &user.password_hash) {
        return Err(invalid_credentials());
    }
    if user.is_banned {
        return Err(ApiError::new(rid, "forbidden", "account has been banned"));
    }

    let session = open_session(&state, rid, user)?;
    Ok(ApiResponse::json(req_id.0, session))
}

/// GET /api/v1/auth/me
pub(in crate::api) async fn me(
    Extension(req_id): Extension<RequestId>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Json<ApiResponse<UserItem>> {
    ApiResponse::json(req_id.0, UserItem::from(user))
}

fn open_session(state: &AppState, rid: &str, user: UserRow) -> Result<SessionData, ApiError> {
    let token = state.jwt.issue(user.id, user.role()).map_err(|e| {
        tracing::error!(error = %e, "token signing failed");
        ApiError::new(rid, "internal_error", "could not create session")
    })?;
    Ok(SessionData {
        token,
        user: UserItem::from(user),
    })
}
