//! Product image uploads, stored on local disk and served under `/uploads`.

use std::io::ErrorKind;

use axum::{
    extract::{multipart::Field, Multipart, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState, UploadSettings, MAX_IMAGES_PER_UPLOAD};

#[derive(Debug, Serialize)]
pub(super) struct UploadedImage {
    url: String,
    filename: String,
    size: usize,
}

/// File extension for an accepted image content type.
fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/gif" => Some("gif"),
        "image/webp" => Some("webp"),
        _ => None,
    }
}

/// Name of a file this server stored, given one of its public URLs.
///
/// Anything that could escape the upload directory yields `None`.
fn uploaded_file_name(url: &str) -> Option<&str> {
    let (_, name) = url.rsplit_once("/uploads/")?;
    let safe = !name.is_empty()
        && !name.starts_with('.')
        && !name.contains(['/', '\\'])
        && name != "..";
    safe.then_some(name)
}

fn multipart_error(rid: &str, error: &axum::extract::multipart::MultipartError) -> ApiError {
    if error.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::new(rid, "payload_too_large", "upload exceeds the size limit")
    } else {
        ApiError::new(rid, "bad_request", error.body_text())
    }
}

async fn store_image(
    settings: &UploadSettings,
    rid: &str,
    field: Field<'_>,
) -> Result<UploadedImage, ApiError> {
    let extension = field
        .content_type()
        .and_then(image_extension)
        .ok_or_else(|| {
            ApiError::validation(rid, "only jpeg, png, gif and webp images are allowed")
        })?;

    let bytes = field.bytes().await.map_err(|e| multipart_error(rid, &e))?;
    if bytes.is_empty() {
        return Err(ApiError::validation(rid, "uploaded file is empty"));
    }
    if bytes.len() > settings.max_bytes {
        return Err(ApiError::new(
            rid,
            "payload_too_large",
            format!("images are limited to {} bytes", settings.max_bytes),
        ));
    }

    let filename = format!("{}.{extension}", Uuid::new_v4());
    let write = async {
        tokio::fs::create_dir_all(&settings.dir).await?;
        tokio::fs::write(settings.dir.join(&filename), &bytes).await
    };
    write.await.map_err(|e| {
        tracing::error!(error = %e, dir = %settings.dir.display(), "failed to store upload");
        ApiError::new(rid, "internal_error", "failed to store upload")
    })?;

    tracing::info!(%filename, size = bytes.len(), "image uploaded");
    Ok(UploadedImage {
        url: format!("{}/uploads/{filename}", settings.public_base_url),
        filename,
        size: bytes.len(),
    })
}

/// POST /api/v1/uploads/image: one file in the `image` field.
pub(in crate::api) async fn upload_image(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<UploadedImage>>), ApiError> {
    let rid = &req_id.0;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(rid, &e))?
    {
        if field.name() == Some("image") {
            let image = store_image(&state.uploads, rid, field).await?;
            return Ok((StatusCode::CREATED, ApiResponse::json(req_id.0, image)));
        }
    }

    Err(ApiError::validation(rid, "no file uploaded"))
}

/// POST /api/v1/uploads/images: up to five files in the `images` field.
pub(in crate::api) async fn upload_images(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<ApiResponse<Vec<UploadedImage>>>), ApiError> {
    let rid = &req_id.0;
    let mut stored = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(rid, &e))?
    {
        if field.name() != Some("images") {
            continue;
        }
        if stored.len() == MAX_IMAGES_PER_UPLOAD {
            remove_files(&state.uploads, &file_names(&stored)).await;
            return Err(ApiError::validation(
                rid,
                format!("at most {MAX_IMAGES_PER_UPLOAD} images per upload"),
            ));
        }
        match store_image(&state.uploads, rid, field).await {
            Ok(image) => stored.push(image),
            Err(e) => {
                remove_files(&state.uploads, &file_names(&stored)).await;
                return Err(e);
            }
        }
    }

    if stored.is_empty() {
        return Err(ApiError::validation(rid, "no files uploaded"));
    }
    Ok((StatusCode::CREATED, ApiResponse::json(req_id.0, stored)))
}

fn file_names(images: &[UploadedImage]) -> Vec<String> {
    images.iter().map(|image| image.filename.clone()).collect()
}

/// Deletes the files behind product image URLs that point at this server.
///
/// Returns how many files were removed. Failures are logged, never raised.
pub(super) async fn remove_uploaded_files(settings: &UploadSettings, urls: &[String]) -> usize {
    let names: Vec<String> = urls
        .iter()
        .filter_map(|url| uploaded_file_name(url))
        .map(ToOwned::to_owned)
        .collect();
    remove_files(settings, &names).await
}

async fn remove_files(settings: &UploadSettings, names: &[String]) -> usize {
    let mut removed = 0;
    for name in names {
        match tokio::fs::remove_file(settings.dir.join(name)).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(error = %e, file = %name, "failed to delete uploaded image"),
        }
    }
    removed
}
