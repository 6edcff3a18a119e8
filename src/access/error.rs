// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authorization and assignment errors.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::auth::Role;
use crate::storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// Identity lacks the role an endpoint requires
    #[error("Role '{0}' is required")]
    InsufficientRole(Role),
    #[error("Permission '{0}' is required")]
    InsufficientPermission(String),
    #[error("Scope '{0}' is required")]
    InsufficientScope(String),
    /// Identity carries neither doctor nor patient
    #[error("User does not have a valid role")]
    NoRole,
    /// Resource predicate evaluated to false
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("Patient is already assigned to a doctor")]
    AlreadyAssigned,
    #[error("Patient is not assigned to a doctor")]
    NotAssigned,
    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

#[derive(Serialize)]
struct AccessErrorBody {
    error: String,
    error_code: String,
}

impl AccessError {
    pub fn forbidden(message: impl Into<String>) -> Self {
        AccessError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AccessError::NotFound(message.into())
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AccessError::InsufficientRole(_) => "insufficient_role",
            AccessError::InsufficientPermission(_) => "insufficient_permission",
            AccessError::InsufficientScope(_) => "insufficient_scope",
            AccessError::NoRole => "no_role",
            AccessError::Forbidden(_) => "forbidden",
            AccessError::NotFound(_) => "not_found",
            AccessError::AlreadyAssigned => "already_assigned",
            AccessError::NotAssigned => "not_assigned",
            AccessError::Store(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AccessError::InsufficientRole(_)
            | AccessError::InsufficientPermission(_)
            | AccessError::InsufficientScope(_)
            | AccessError::NoRole
            | AccessError::Forbidden(_) => StatusCode::FORBIDDEN,
            AccessError::NotFound(_) => StatusCode::NOT_FOUND,
            AccessError::AlreadyAssigned | AccessError::NotAssigned => StatusCode::CONFLICT,
            AccessError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AccessError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            AccessError::Store(e) => {
                tracing::error!(error = %e, "Storage failure during access check");
                "Internal storage error".to_string()
            }
            other => other.to_string(),
        };
        let body = Json(AccessErrorBody {
            error: message,
            error_code: self.error_code().to_string(),
        });
        (status, body).into_response()
    }
}
