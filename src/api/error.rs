//! Unified API error handling
//!
//! This module provides a consistent error response format across all API
//! endpoints. Internal error kinds never leak; clients only see the
//! sanitized `{error, message, request_id}` form.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use uuid::Uuid;

use crate::service::captcha::CaptchaError;
use crate::service::enrichment::EnrichmentError;

/// Standard error response format
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error type/code
    pub error: String,
    /// Human-readable error message
    pub message: String,
    /// Unique request ID for tracing
    pub request_id: String,
    /// Upstream error codes, when the CAPTCHA verifier rejected the token
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<String>>,
}

/// Unified API error type
///
/// All API endpoints return `Result<T, ApiError>` for consistent error
/// handling.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Invalid CVE identifier or otherwise malformed request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// CAPTCHA enabled but no token header present (400)
    #[error("CAPTCHA token header is required")]
    MissingCaptchaToken,

    /// Bad or missing internal secret (401)
    #[error("Unauthorized")]
    Unauthorized,

    /// The CAPTCHA verifier rejected the token (403)
    #[error("CAPTCHA verification failed")]
    CaptchaRejected(Vec<String>),

    /// CVE not found in NVD (404)
    #[error("CVE not found: {0}")]
    NotFound(String),

    /// Sliding-window rate limit exceeded (429)
    #[error("Rate limit exceeded")]
    RateLimited,

    /// Internal server error (500)
    #[error("Internal server error")]
    Internal(String),

    /// Upstream failed in a way that could not be degraded (502)
    #[error("External service error")]
    ExternalService(String),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::MissingCaptchaToken => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::CaptchaRejected(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ExternalService(_) => StatusCode::BAD_GATEWAY,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let error_type = match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::MissingCaptchaToken => "captcha_token_missing",
            ApiError::Unauthorized => "unauthorized",
            ApiError::CaptchaRejected(_) => "captcha_failed",
            ApiError::NotFound(_) => "not_found",
            ApiError::RateLimited => "rate_limited",
            ApiError::Internal(_) => "internal_error",
            ApiError::ExternalService(_) => "external_service_error",
        };

        let request_id = Uuid::new_v4().to_string();

        tracing::warn!(
            error_type = error_type,
            status = status.as_u16(),
            request_id = %request_id,
            message = %self,
            "API error"
        );

        let details = match self {
            ApiError::CaptchaRejected(codes) => Some(codes.clone()),
            _ => None,
        };

        HttpResponse::build(status)
            .insert_header(("X-Request-Id", request_id.clone()))
            .json(ErrorResponse {
                error: error_type.to_string(),
                message: self.to_string(),
                request_id,
                details,
            })
    }
}

// ============================================================================
// From conversions for service errors
// ============================================================================

impl From<EnrichmentError> for ApiError {
    fn from(err: EnrichmentError) -> Self {
        match err {
            EnrichmentError::NotFound(id) => ApiError::NotFound(id),
        }
    }
}

impl From<CaptchaError> for ApiError {
    fn from(err: CaptchaError) -> Self {
        match err {
            CaptchaError::Rejected(codes) => ApiError::CaptchaRejected(codes),
            CaptchaError::Upstream(e) => ApiError::ExternalService(e.to_string()),
        }
    }
}
