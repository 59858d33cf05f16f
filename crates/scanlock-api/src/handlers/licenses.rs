//! License handlers.
//!
//! Authentication, rate limiting, and input sanitization are applied
//! upstream; these handlers trust the `x-user-id` principal header and the
//! sanitized body fields.

use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
};
use scanlock_core::ids::UserId;
use scanlock_core::license::DeviceAttributes;
use scanlock_core::tier::Tier;
use scanlock_core::Error;
use scanlock_service::{CreateLicenseRequest, CreatedLicense, RequestContext, VerifiedLicense};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::error;

use crate::state::AppState;

#[derive(Serialize)]
pub struct ErrorBody {
    pub message: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorBody {
            message: message.into(),
        }),
    )
}

/// Map a core error to its HTTP status class.
///
/// Verify-path failures collapse to one uniform message so callers cannot
/// distinguish unknown keys from invalid ones.
fn map_error(err: Error) -> ApiError {
    match err {
        Error::Validation(_) | Error::UnknownTier(_) | Error::AlreadyLicensed => {
            api_error(StatusCode::BAD_REQUEST, err.to_string())
        }
        Error::LicenseInvalid => api_error(StatusCode::FORBIDDEN, "License invalid or expired"),
        Error::DeviceMismatch => api_error(StatusCode::FORBIDDEN, "Invalid device"),
        Error::NotFound(_) => api_error(StatusCode::NOT_FOUND, "License not found"),
        other => {
            error!(error = %other, "internal error");
            api_error(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

/// Authenticated principal, supplied by the upstream auth layer.
fn principal(headers: &HeaderMap) -> Result<UserId, ApiError> {
    let raw = headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| api_error(StatusCode::UNAUTHORIZED, "Authentication required"))?;
    UserId::from_str(raw)
        .map_err(|_| api_error(StatusCode::UNAUTHORIZED, "Authentication required"))
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    let client_ip = headers
        .get("x-forwarded-for")
        .or_else(|| headers.get("x-real-ip"))
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string());
    RequestContext {
        client_ip,
        user_agent,
    }
}

fn default_tier() -> String {
    "TRIAL".to_string()
}

#[derive(Deserialize)]
pub struct CreateLicenseBody {
    pub device_info: DeviceAttributes,
    #[serde(default = "default_tier")]
    pub tier: String,
}

#[derive(Serialize)]
pub struct CreateLicenseResponse {
    pub license: CreatedLicense,
}

pub async fn create_license(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CreateLicenseBody>,
) -> Result<(StatusCode, Json<CreateLicenseResponse>), ApiError> {
    let user_id = principal(&headers)?;
    let ctx = request_context(&headers);
    let tier = Tier::from_str(&body.tier).map_err(map_error)?;

    let created = state
        .licenses
        .create_license(
            CreateLicenseRequest {
                user_id,
                device: body.device_info,
                tier,
            },
            &ctx,
        )
        .await
        .map_err(map_error)?;

    Ok((
        StatusCode::CREATED,
        Json(CreateLicenseResponse { license: created }),
    ))
}

#[derive(Deserialize)]
pub struct VerifyLicenseBody {
    pub key: String,
    pub device_info: DeviceAttributes,
}

#[derive(Serialize)]
pub struct VerifyLicenseResponse {
    pub license: VerifiedLicense,
}

pub async fn verify_license(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<VerifyLicenseBody>,
) -> Result<Json<VerifyLicenseResponse>, ApiError> {
    let ctx = request_context(&headers);

    let verified = state
        .licenses
        .verify_license(&body.key, &body.device_info, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(VerifyLicenseResponse { license: verified }))
}

#[derive(Serialize)]
pub struct LicenseDetailsResponse {
    pub key: String,
    pub user_id: String,
    pub tier: Tier,
    pub status: scanlock_core::license::LicenseStatus,
    pub start_date: String,
    pub end_date: String,
    pub scan_count: u64,
    pub scan_limit: Option<u64>,
    pub activations: u32,
    pub suspicious_activity_count: usize,
}

pub async fn get_license(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<Json<LicenseDetailsResponse>, ApiError> {
    let ctx = request_context(&headers);
    let license = state
        .licenses
        .get_license(&key, &ctx)
        .await
        .map_err(map_error)?;

    Ok(Json(LicenseDetailsResponse {
        key: license.key.to_string(),
        user_id: license.user_id.to_string(),
        tier: license.tier,
        status: license.status,
        start_date: license.start_date.to_rfc3339(),
        end_date: license.end_date.to_rfc3339(),
        scan_count: license.usage.scan_count,
        scan_limit: license.usage.scan_limit,
        activations: license.usage.activations,
        suspicious_activity_count: license.security.suspicious_activities.len(),
    }))
}

pub async fn revoke_license(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Result<StatusCode, ApiError> {
    let ctx = request_context(&headers);
    state
        .licenses
        .revoke_license(&key, &ctx)
        .await
        .map_err(map_error)?;
    Ok(StatusCode::NO_CONTENT)
}
