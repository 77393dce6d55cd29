//! User provisioning types and service.

#[cfg(test)]
pub mod fakes;
mod service;

pub use service::*;

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Role a caller must carry to provision users.
pub const ADMIN_ROLE: &str = "admin";

/// Caller-supplied account creation request.
///
/// Fields default to empty strings so an absent field and an empty one are
/// rejected the same way. Validation runs after the permission check.
#[derive(Debug, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionRequest {
    #[serde(default)]
    #[validate(length(min = 1, message = "email, password, displayName and role are required."))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "email, password, displayName and role are required."))]
    pub password: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "email, password, displayName and role are required."))]
    pub display_name: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "email, password, displayName and role are required."))]
    pub role: String,
}

/// Success payload of a provisioning call.
#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct Provisioned {
    pub success: bool,
    /// Human-readable confirmation naming the created email.
    pub message: String,
    /// Provider-issued identifier.
    pub uid: String,
}

/// Authenticated identity of the caller, as decoded from its token.
///
/// Built by the HTTP layer; an absent or invalid token yields an anonymous
/// context so the permission check stays a pure function of its inputs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallerContext {
    pub subject: Option<String>,
    pub role: Option<String>,
}

impl CallerContext {
    /// Context of an unauthenticated caller.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Whether the caller carries the verified `admin` role claim.
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }
}
