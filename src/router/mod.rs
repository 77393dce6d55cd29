//! HTTP API surface.

pub mod provision;
pub mod status;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware;
use axum::response::Response;

use crate::AppState;
use crate::user::CallerContext;

const BEARER: &str = "Bearer ";

/// Middleware decoding the caller's token into a [`CallerContext`]
/// extension.
///
/// Never rejects: a missing or invalid token yields an anonymous context,
/// and the permission check downstream decides.
pub(crate) async fn caller(
    State(state): State<AppState>,
    mut req: Request,
    next: middleware::Next,
) -> Response {
    let ctx = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|token| state.token.decode(&token.replace(BEARER, "")).ok())
        .map(|claims| CallerContext {
            subject: Some(claims.sub),
            role: claims.role,
        })
        .unwrap_or_else(CallerContext::anonymous);

    req.extensions_mut().insert(ctx);
    next.run(req).await
}
