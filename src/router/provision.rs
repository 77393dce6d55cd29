use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::{Extension, Json};

use crate::AppState;
use crate::error::Result;
use crate::user::{CallerContext, Provisioned, ProvisionRequest};

/// Handler to create a user on behalf of an administrator.
pub async fn handler(
    State(state): State<AppState>,
    Extension(ctx): Extension<CallerContext>,
    payload: std::result::Result<Json<ProvisionRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Provisioned>)> {
    let Json(request) = payload?;
    let provisioned = state.provisioner.provision(&ctx, request).await?;

    Ok((StatusCode::CREATED, Json(provisioned)))
}
