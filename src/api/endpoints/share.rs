//! Share link endpoints.
//!
//! - `POST /api/share`: issue a link for the session's patient
//! - `DELETE /api/share`: revoke the session's active link
//! - `GET /api/share/:token`: clinician resolve, no session

use std::net::SocketAddr;

use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, HeaderMap};
use axum::Extension;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::{
    client_ip, ApiContext, IssueRequest, IssueResponse, PatientContext, RevokeResponse,
};
use crate::sharing::issuer::validate_identifier;
use crate::sharing::qr::{generate_qr_svg, share_url};
use crate::sharing::{ClientInfo, ResolvedShare};

/// `POST /api/share`: mint a share link and its QR code.
pub async fn issue(
    State(ctx): State<ApiContext>,
    Extension(patient): Extension<PatientContext>,
    body: Result<Json<IssueRequest>, JsonRejection>,
) -> Result<Json<IssueResponse>, ApiError> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let requested = validate_identifier("patient_id", &request.patient_id)?;
    if requested != patient.patient_id {
        tracing::warn!(
            patient_id = %patient.patient_id,
            "Share issue refused: body names another patient"
        );
        return Err(ApiError::Forbidden);
    }

    let share = ctx.share.clone();
    let facility_id = request.facility_id;
    let issued = tokio::task::spawn_blocking(move || {
        share.issuer.issue(&requested, facility_id.as_deref())
    })
    .await??;

    let url = share_url(&ctx.share.config.public_base_url, &issued.raw_token);
    let qr_svg = generate_qr_svg(&url).map_err(ApiError::Internal)?;

    Ok(Json(IssueResponse {
        token: issued.raw_token,
        expires_at: issued.expires_at,
        share_url: url,
        qr_svg,
    }))
}

/// `DELETE /api/share`: revoke whatever link the patient has active.
pub async fn revoke(
    State(ctx): State<ApiContext>,
    Extension(patient): Extension<PatientContext>,
) -> Result<Json<RevokeResponse>, ApiError> {
    let share = ctx.share.clone();
    let revoked = tokio::task::spawn_blocking(move || {
        share
            .revocation
            .revoke_active_for_patient(&patient.patient_id)
    })
    .await??;

    Ok(Json(RevokeResponse { revoked }))
}

/// `GET /api/share/:token`: clinician view of the patient's recent records.
pub async fn resolve(
    State(ctx): State<ApiContext>,
    Path(token): Path<String>,
    connect: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
) -> Result<Json<ResolvedShare>, ApiError> {
    let client = ClientInfo {
        ip: client_ip(&headers, connect.map(|ConnectInfo(addr)| addr)),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    };

    let share = ctx.share.clone();
    let view = tokio::task::spawn_blocking(move || share.gate.resolve(&token, &client)).await??;

    Ok(Json(view))
}
