// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Axum extractors for authenticated callers.
//!
//! Use the extractors in handlers to require authentication:
//!
//! ```rust,ignore
//! async fn my_handler(DoctorUser(doctor): DoctorUser) -> impl IntoResponse {
//!     // doctor is the provisioned local User, role already checked
//! }
//! ```
//!
//! Each extractor builds on the previous one:
//!
//! - [`Auth`]: verified token → [`Identity`]
//! - [`DoctorUser`] / [`PatientUser`]: role gate, then the provisioned
//!   local [`User`]

use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

use super::{AuthError, Identity, Role};
use crate::access::{require_role, AccessError};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::User;

/// Extractor for a verified identity.
///
/// The identity is cached in request extensions so that stacked extractors
/// verify the token only once.
///
/// # Example
///
/// ```rust,ignore
/// async fn me(Auth(identity): Auth) -> Json<Identity> {
///     Json(identity)
/// }
/// ```
pub struct Auth(pub Identity);

impl FromRequestParts<AppState> for Auth {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>().cloned() {
            return Ok(Auth(identity));
        }

        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or(AuthError::MissingToken)?
            .to_str()
            .map_err(|_| AuthError::InvalidAuthHeader)?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::InvalidAuthHeader)?;

        let claims = state.verifier.verify(token).await?;
        let identity = state.claims.extract(&claims)?;

        parts.extensions.insert(identity.clone());
        Ok(Auth(identity))
    }
}

/// Gate on `role`, provision, and make sure the stored role agrees.
async fn user_with_role(parts: &mut Parts, state: &AppState, role: Role) -> Result<User, ApiError> {
    let Auth(identity) = Auth::from_request_parts(parts, state).await?;
    require_role(&identity, role)?;

    let user = state.provisioner.provision(&identity)?;
    if user.role != role {
        // Stored role is authoritative once provisioned.
        tracing::debug!(user_id = %user.id, stored = %user.role, required = %role, "Stored role mismatch");
        return Err(AccessError::InsufficientRole(role).into());
    }
    Ok(user)
}

/// Extractor that requires the doctor role.
pub struct DoctorUser(pub User);

impl FromRequestParts<AppState> for DoctorUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, Role::Doctor).await.map(DoctorUser)
    }
}

/// Extractor that requires the patient role.
pub struct PatientUser(pub User);

impl FromRequestParts<AppState> for PatientUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        user_with_role(parts, state, Role::Patient).await.map(PatientUser)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::test_support::{bearer_for, test_state, TestKey};
    use axum::http::{Request, StatusCode};

    fn parts_with(auth: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/test");
        if let Some(value) = auth {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn auth_extractor_requires_auth_header() {
        let (state, _source) = test_state();
        let mut parts = parts_with(None);

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::MissingToken)));
    }

    #[tokio::test]
    async fn auth_extractor_rejects_non_bearer() {
        let (state, _source) = test_state();
        let mut parts = parts_with(Some("Basic dXNlcjpwYXNz"));

        let result = Auth::from_request_parts(&mut parts, &state).await;
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[tokio::test]
    async fn auth_extractor_succeeds_with_jwt() {
        let (state, _source) = test_state();
        let header = bearer_for("auth0|doc-1", &["doctor"]);
        let mut parts = parts_with(Some(&header));

        let Auth(identity) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(identity.subject, "auth0|doc-1");
        assert!(identity.has_role(Role::Doctor));
    }

    #[tokio::test]
    async fn auth_extractor_prefers_extensions() {
        let (state, source) = test_state();
        let header = bearer_for("auth0|doc-1", &["doctor"]);
        let mut parts = parts_with(Some(&header));

        Auth::from_request_parts(&mut parts, &state).await.unwrap();
        source.set_unreachable(true);
        // Second extraction is served from extensions, not the verifier.
        let Auth(identity) = Auth::from_request_parts(&mut parts, &state).await.unwrap();
        assert_eq!(identity.subject, "auth0|doc-1");
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn corrupted_token_never_reaches_provisioning() {
        let (state, _source) = test_state();
        let header = format!("{}x", bearer_for("auth0|doc-1", &["doctor"]));
        let mut parts = parts_with(Some(&header));

        let result = DoctorUser::from_request_parts(&mut parts, &state).await;
        assert_eq!(result.err().unwrap().status, StatusCode::UNAUTHORIZED);
        assert!(state.store.find_user("auth0|doc-1").unwrap().is_none());
    }

    #[tokio::test]
    async fn doctor_user_provisions_doctor() {
        let (state, _source) = test_state();
        let header = bearer_for("auth0|doc-1", &["doctor"]);
        let mut parts = parts_with(Some(&header));

        let DoctorUser(user) = DoctorUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.role, Role::Doctor);
        assert!(state.store.find_user("auth0|doc-1").unwrap().is_some());
    }

    #[tokio::test]
    async fn patient_cannot_use_doctor_routes() {
        let (state, _source) = test_state();
        let header = bearer_for("auth0|pat-1", &["patient"]);
        let mut parts = parts_with(Some(&header));

        let err = DoctorUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "insufficient_role");
    }

    #[tokio::test]
    async fn token_without_roles_is_no_role() {
        let (state, _source) = test_state();
        let header = bearer_for("auth0|nobody", &[]);
        let mut parts = parts_with(Some(&header));

        let err = PatientUser::from_request_parts(&mut parts, &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "no_role");
    }

    #[tokio::test]
    async fn stored_role_is_authoritative() {
        let (state, _source) = test_state();
        let header = bearer_for("auth0|x", &["patient"]);
        PatientUser::from_request_parts(&mut parts_with(Some(&header)), &state)
            .await
            .unwrap();

        // Same subject later presents a doctor role claim.
        let header = bearer_for("auth0|x", &["doctor"]);
        let err = DoctorUser::from_request_parts(&mut parts_with(Some(&header)), &state)
            .await
            .err()
            .unwrap();
        assert_eq!(err.status, StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn unknown_key_is_unauthorized() {
        let (state, _source) = test_state();
        let token = crate::auth::test_support::mint(
            TestKey::Rotated,
            &crate::auth::test_support::claims_for("auth0|x", &["doctor"]),
        );
        let header = format!("Bearer {token}");
        let result = Auth::from_request_parts(&mut parts_with(Some(&header)), &state).await;
        assert!(matches!(result, Err(AuthError::UnknownSigningKey)));
    }
}
