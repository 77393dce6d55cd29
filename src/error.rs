//! Error handler for provisa.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::identity::IdentityError;
use crate::profile::ProfileError;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Enum representing server-side errors.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("only administrators may perform this action")]
    PermissionDenied,

    #[error("email, password, displayName and role are all required")]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Axum(#[from] JsonRejection),

    #[error("email {email} is already used by another account")]
    AlreadyExists { email: String },

    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("{details}")]
    Internal { details: String },
}

impl ServerError {
    /// Stable string code exposed to callers.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::Validation(_) | Self::Axum(_) => "invalid-argument",
            Self::AlreadyExists { .. } => "already-exists",
            Self::Token(_) | Self::Internal { .. } => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::PermissionDenied => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::Axum(_) => StatusCode::BAD_REQUEST,
            Self::AlreadyExists { .. } => StatusCode::CONFLICT,
            Self::Token(_) | Self::Internal { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}

impl From<IdentityError> for ServerError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::EmailTaken { email } => {
                Self::AlreadyExists { email }
            },
            IdentityError::Provider(details) => Self::Internal { details },
        }
    }
}

impl From<ProfileError> for ServerError {
    fn from(err: ProfileError) -> Self {
        Self::Internal {
            details: err.to_string(),
        }
    }
}

/// Structure for detailed error responses.
#[derive(Debug, Serialize)]
pub struct ResponseError {
    code: &'static str,
    message: String,
    status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<Vec<FieldError>>,
}

#[derive(Debug, Serialize)]
struct FieldError {
    field: String,
    message: String,
}

fn parse_validation_errors(errors: &ValidationErrors) -> Vec<FieldError> {
    errors
        .field_errors()
        .iter()
        .flat_map(|(field, issues)| {
            issues.iter().map(move |issue| FieldError {
                field: field.to_string(),
                message: issue.to_string(),
            })
        })
        .collect()
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        if let Self::Internal { details } = &self {
            tracing::error!(%details, "server returned 500 status");
        }

        let errors = match &self {
            Self::Validation(validation_errors) => {
                Some(parse_validation_errors(validation_errors))
            },
            _ => None,
        };

        let status = self.status();
        let body = ResponseError {
            code: self.code(),
            message: self.to_string(),
            status: status.as_u16(),
            errors,
        };

        (status, Json(body)).into_response()
    }
}
