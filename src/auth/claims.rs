// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed identity derived from verified token claims.

use std::collections::BTreeSet;

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::error::AuthError;
use super::roles::Role;
use super::verifier::VerifiedClaims;

/// Standard claims read from the payload.
///
/// Fields must have the right JSON type when present; a mismatch rejects the
/// token instead of silently dropping the claim.
#[derive(Debug, Deserialize)]
struct StandardClaims {
    #[serde(default)]
    sub: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    given_name: Option<String>,
    #[serde(default)]
    family_name: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Name hints from the identity provider, used when creating a local user.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProfileHints {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub given_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub family_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Authenticated caller, derived per request from a verified token.
///
/// Never persisted as-is; see [`crate::provisioning::UserProvisioner`] for the
/// local user record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    /// Provider subject id (`sub`)
    pub subject: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Raw role claims, unknown values included
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    /// `scope` split on whitespace
    pub scopes: BTreeSet<String>,
    #[serde(default)]
    pub profile: ProfileHints,
}

impl Identity {
    /// Check if the role claim list contains `role`.
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.iter().any(|r| Role::from_str(r) == Some(role))
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains(scope)
    }

    /// The single local role for this identity (doctor wins over patient).
    pub fn resolved_role(&self) -> Option<Role> {
        Role::resolve(&self.roles)
    }
}

/// Projects verified claims onto an [`Identity`].
///
/// Custom claims live under a configured namespace prefix, e.g.
/// `https://patientlink.example/roles`.
#[derive(Debug, Clone)]
pub struct ClaimExtractor {
    roles_claim: String,
    permissions_claim: String,
}

impl ClaimExtractor {
    pub fn new(namespace: impl AsRef<str>) -> Self {
        let namespace = namespace.as_ref();
        Self {
            roles_claim: format!("{namespace}roles"),
            permissions_claim: format!("{namespace}permissions"),
        }
    }

    pub fn roles_claim(&self) -> &str {
        &self.roles_claim
    }

    pub fn permissions_claim(&self) -> &str {
        &self.permissions_claim
    }

    /// Build an identity from verified claims.
    ///
    /// An empty role list is not an error here; role gates decide that.
    pub fn extract(&self, claims: &VerifiedClaims) -> Result<Identity, AuthError> {
        let map = claims.as_map();
        let standard: StandardClaims = serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| {
                tracing::debug!(error = %e, "Standard claims have unexpected types");
                AuthError::MalformedToken
            })?;

        let subject = standard
            .sub
            .filter(|s| !s.trim().is_empty())
            .ok_or(AuthError::MalformedToken)?;

        let roles: Vec<String> = optional_claim(map, &self.roles_claim)?.unwrap_or_default();
        let permissions: Vec<String> =
            optional_claim(map, &self.permissions_claim)?.unwrap_or_default();

        let scopes = standard
            .scope
            .as_deref()
            .unwrap_or_default()
            .split_whitespace()
            .map(str::to_string)
            .collect();

        Ok(Identity {
            subject,
            email: standard.email.filter(|e| !e.is_empty()),
            roles,
            permissions,
            scopes,
            profile: ProfileHints {
                given_name: standard.given_name,
                family_name: standard.family_name,
                name: standard.name,
            },
        })
    }
}

fn optional_claim<T: DeserializeOwned>(
    map: &Map<String, Value>,
    claim: &str,
) -> Result<Option<T>, AuthError> {
    match map.get(claim) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
            tracing::debug!(claim = %claim, error = %e, "Custom claim has unexpected type");
            AuthError::MalformedToken
        }),
    }
}
