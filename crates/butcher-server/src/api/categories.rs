use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use butcher_core::validation::{optional_text, require_text};
use butcher_db::{CategoryRow, CategoryUpdate, NewCategory};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{
    double_option, map_db_error, map_validation_error, ApiError, ApiResponse, AppState,
    MessageData,
};

const NAME_MAX: usize = 100;
const DESCRIPTION_MAX: usize = 1000;

#[derive(Debug, Serialize)]
pub(super) struct CategoryItem {
    id: i64,
    name: String,
    name_ar: String,
    description: Option<String>,
    description_ar: Option<String>,
    image: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CategoryRow> for CategoryItem {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            name_ar: row.name_ar,
            description: row.description,
            description_ar: row.description_ar,
            image: row.image,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct CreateCategoryRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub name_ar: String,
    pub description: Option<String>,
    pub description_ar: Option<String>,
    pub image: Option<String>,
}

#[allow(clippy::option_option)]
#[derive(Debug, Deserialize)]
pub(in crate::api) struct UpdateCategoryRequest {
    pub name: Option<String>,
    pub name_ar: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description_ar: Option<Option<String>>,
    pub image: Option<String>,
}

/// GET /api/v1/categories: active categories by name.
pub(in crate::api) async fn list_categories(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CategoryItem>>>, ApiError> {
    let rows = butcher_db::list_active_categories(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::json(
        req_id.0,
        rows.into_iter().map(CategoryItem::from).collect(),
    ))
}

/// GET /api/v1/categories/{id}
pub(in crate::api) async fn get_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let row = butcher_db::get_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .filter(|row| row.is_active)
        .ok_or_else(|| ApiError::not_found(&req_id.0, "category"))?;

    Ok(ApiResponse::json(req_id.0, CategoryItem::from(row)))
}

/// POST /api/v1/categories
pub(in crate::api) async fn create_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<CategoryItem>>), ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);

    let name = require_text("name", &body.name, NAME_MAX).map_err(invalid)?;
    let name_ar = require_text("name_ar", &body.name_ar, NAME_MAX).map_err(invalid)?;
    let description =
        optional_text("description", body.description.as_deref(), DESCRIPTION_MAX)
            .map_err(invalid)?;
    let description_ar =
        optional_text("description_ar", body.description_ar.as_deref(), DESCRIPTION_MAX)
            .map_err(invalid)?;

    let row = butcher_db::create_category(
        &state.pool,
        &NewCategory {
            name: &name,
            name_ar: &name_ar,
            description: description.as_deref(),
            description_ar: description_ar.as_deref(),
            image: body.image.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;
    tracing::info!(category_id = row.id, "category created");

    Ok((
        StatusCode::CREATED,
        ApiResponse::json(req_id.0, CategoryItem::from(row)),
    ))
}

/// PUT /api/v1/categories/{id}: sparse update.
pub(in crate::api) async fn update_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCategoryRequest>,
) -> Result<Json<ApiResponse<CategoryItem>>, ApiError> {
    let rid = &req_id.0;
    let invalid = |e| map_validation_error(rid, &e);

    let name = body
        .name
        .as_deref()
        .map(|v| require_text("name", v, NAME_MAX))
        .transpose()
        .map_err(invalid)?;
    let name_ar = body
        .name_ar
        .as_deref()
        .map(|v| require_text("name_ar", v, NAME_MAX))
        .transpose()
        .map_err(invalid)?;
    let description = body
        .description
        .as_ref()
        .map(|v| optional_text("description", v.as_deref(), DESCRIPTION_MAX))
        .transpose()
        .map_err(invalid)?;
    let description_ar = body
        .description_ar
        .as_ref()
        .map(|v| optional_text("description_ar", v.as_deref(), DESCRIPTION_MAX))
        .transpose()
        .map_err(invalid)?;

    let row = butcher_db::update_category(
        &state.pool,
        id,
        &CategoryUpdate {
            name: name.as_deref(),
            name_ar: name_ar.as_deref(),
            description: description.as_ref().map(Option::as_deref),
            description_ar: description_ar.as_ref().map(Option::as_deref),
            image: body.image.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(rid.clone(), &e))?;

    Ok(ApiResponse::json(req_id.0, CategoryItem::from(row)))
}

/// DELETE /api/v1/categories/{id}: soft delete.
pub(in crate::api) async fn delete_category(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageData>>, ApiError> {
    butcher_db::deactivate_category(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    tracing::info!(category_id = id, "category deactivated");

    Ok(ApiResponse::json(
        req_id.0,
        MessageData {
            message: "category deleted".to_owned(),
        },
    ))
}
