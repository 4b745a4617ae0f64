use axum::{
    extract::{Path, State},
    Extension, Json,
};
use butcher_core::Role;
use butcher_db::UserRow;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

/// Public view of an account; the password hash never leaves the server.
#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub father_name: String,
    pub email: String,
    pub mobile: String,
    pub role: Role,
    pub is_banned: bool,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for UserItem {
    fn from(row: UserRow) -> Self {
        let role = row.role();
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            father_name: row.father_name,
            email: row.email,
            mobile: row.mobile,
            role,
            is_banned: row.is_banned,
            created_at: row.created_at,
        }
    }
}

/// GET /api/v1/users: all customer accounts, newest first.
pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<UserItem>>>, ApiError> {
    let rows = butcher_db::list_customers(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::json(
        req_id.0,
        rows.into_iter().map(UserItem::from).collect(),
    ))
}

/// PUT /api/v1/users/{id}/ban
pub(super) async fn ban_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    set_banned(&state, req_id, id, true).await
}

/// PUT /api/v1/users/{id}/unban
pub(super) async fn unban_user(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    set_banned(&state, req_id, id, false).await
}

async fn set_banned(
    state: &AppState,
    req_id: RequestId,
    id: i64,
    banned: bool,
) -> Result<Json<ApiResponse<UserItem>>, ApiError> {
    let rid = &req_id.0;
    let user = butcher_db::get_user_by_id(&state.pool, id)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?
        .ok_or_else(|| ApiError::not_found(rid, "user"))?;

    if user.is_admin() {
        return Err(ApiError::new(
            rid,
            "forbidden",
            "admin accounts cannot be banned",
        ));
    }

    let row = butcher_db::set_user_banned(&state.pool, user.id, banned)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(user_id = row.id, banned, "user ban status changed");

    Ok(ApiResponse::json(req_id.0, UserItem::from(row)))
}
