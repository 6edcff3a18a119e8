// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, Json};

use crate::{
    access::require_scope,
    auth::Auth,
    error::ApiError,
    models::{MeResponse, ScopedResponse},
    state::AppState,
};

/// Scope required by the scoped probe.
pub const READ_DOCUMENTS_SCOPE: &str = "read:documents";

/// Return the caller's local user, creating it on first sight.
#[utoipa::path(
    get,
    path = "/v1/auth/me",
    tag = "Auth",
    security(("bearer" = [])),
    responses(
        (status = 200, body = MeResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Token carries no recognised role")
    )
)]
pub async fn me(
    State(state): State<AppState>,
    Auth(identity): Auth,
) -> Result<Json<MeResponse>, ApiError> {
    let (user, created) = state.provisioner.provision_with_outcome(&identity)?;
    if created {
        tracing::debug!(user_id = %user.id, "First request from new user");
    }

    Ok(Json(MeResponse {
        user: user.into(),
        permissions: identity.permissions,
        scopes: identity.scopes.into_iter().collect(),
    }))
}

#[utoipa::path(
    get,
    path = "/v1/auth/private-scoped",
    tag = "Auth",
    security(("bearer" = ["read:documents"])),
    responses(
        (status = 200, body = ScopedResponse),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Missing read:documents scope")
    )
)]
pub async fn private_scoped(Auth(identity): Auth) -> Result<Json<ScopedResponse>, ApiError> {
    require_scope(&identity, READ_DOCUMENTS_SCOPE)?;
    Ok(Json(ScopedResponse {
        message: "You are authenticated and hold the read:documents scope".to_string(),
        subject: identity.subject,
    }))
}
