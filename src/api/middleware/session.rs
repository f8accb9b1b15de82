//! Patient session middleware.
//!
//! Patient authentication happens upstream. The gateway in front of this
//! service forwards the verified patient id as `X-Patient-Id`; this layer
//! checks it is present and well-formed and injects `PatientContext` for
//! the handlers.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::PatientContext;
use crate::sharing::issuer::validate_identifier;

pub const PATIENT_HEADER: &str = "X-Patient-Id";

/// Require a verified patient session.
pub async fn require_patient(
    req: Request<axum::body::Body>,
    next: Next,
) -> Response {
    match require_patient_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn require_patient_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let header = req
        .headers()
        .get(PATIENT_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    let patient_id =
        validate_identifier("patient_id", header).map_err(|_| ApiError::Unauthorized)?;

    req.extensions_mut().insert(PatientContext { patient_id });

    Ok(next.run(req).await)
}
