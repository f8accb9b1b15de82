//! Share API router.
//!
//! Returns a composable `Router` with routes nested under `/api/`.
//!
//! - Patient routes (`/share` POST/DELETE): session middleware
//! - Clinician route (`/share/:token` GET): rate limiter, open CORS
//! - `/health`: no middleware
//!
//! Every response carries `Cache-Control: no-store`.

use std::sync::Arc;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::sharing::ShareService;

/// Build the share API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn share_api_router(share: Arc<ShareService>) -> Router {
    build_router(ApiContext::new(share))
}

/// Build router from a pre-constructed `ApiContext` (custom rate limits).
pub fn share_api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // Layers apply bottom (innermost) to top (outermost).
    // Extension must be outermost so middleware can extract ApiContext.
    let patient = Router::new()
        .route(
            "/share",
            post(endpoints::share::issue).delete(endpoints::share::revoke),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::session::require_patient))
        .layer(axum::Extension(ctx.clone()));

    let clinician = Router::new()
        .route("/share/:token", get(endpoints::share::resolve))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        )
        .layer(axum::Extension(ctx.clone()));

    let health = Router::new()
        .route("/health", get(endpoints::health::check))
        .with_state(ctx);

    Router::new()
        .nest("/api", patient)
        .nest("/api", clinician)
        .nest("/api", health)
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
}
