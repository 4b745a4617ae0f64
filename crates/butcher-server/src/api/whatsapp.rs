use axum::{extract::State, Extension, Json};
use butcher_notify::Delivery;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{ApiError, ApiResponse, AppState};

const MESSAGE_MAX: usize = 1600;

#[derive(Debug, Deserialize)]
pub(in crate::api) struct TestMessageRequest {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Serialize)]
pub(in crate::api) struct TestMessageData {
    /// `sent` or `logged`.
    delivery: &'static str,
    sid: Option<String>,
}

/// POST /api/v1/whatsapp/test: send a raw message to check the Twilio setup.
pub(in crate::api) async fn send_test_message(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<TestMessageRequest>,
) -> Result<Json<ApiResponse<TestMessageData>>, ApiError> {
    let rid = &req_id.0;
    let phone = body.phone_number.trim();
    let message = body.message.trim();
    if phone.is_empty() || message.is_empty() {
        return Err(ApiError::validation(
            rid,
            "phone_number and message are required",
        ));
    }
    if message.chars().count() > MESSAGE_MAX {
        return Err(ApiError::validation(
            rid,
            format!("message must be at most {MESSAGE_MAX} characters"),
        ));
    }

    let delivery = state
        .notifier
        .send_whatsapp(phone, message)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "test WhatsApp message failed");
            ApiError::new(rid, "upstream_error", format!("failed to send WhatsApp message: {e}"))
        })?;

    let data = match delivery {
        Delivery::Sent { sid } => TestMessageData {
            delivery: "sent",
            sid: Some(sid),
        },
        Delivery::Logged => TestMessageData {
            delivery: "logged",
            sid: None,
        },
    };
    Ok(ApiResponse::json(req_id.0, data))
}
