// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Endpoint gates, applied to the identity before a handler runs.

use super::AccessError;
use crate::auth::{Identity, Role};

/// Pass iff the identity's role claims contain `role`.
///
/// An identity with no recognised role at all fails with [`AccessError::NoRole`].
pub fn require_role(identity: &Identity, role: Role) -> Result<(), AccessError> {
    if identity.has_role(role) {
        return Ok(());
    }
    if identity.resolved_role().is_none() {
        tracing::debug!(user_id = %identity.subject, "Identity carries no recognised role");
        return Err(AccessError::NoRole);
    }
    Err(AccessError::InsufficientRole(role))
}

pub fn require_permission(identity: &Identity, permission: &str) -> Result<(), AccessError> {
    if identity.has_permission(permission) {
        Ok(())
    } else {
        Err(AccessError::InsufficientPermission(permission.to_string()))
    }
}

pub fn require_scope(identity: &Identity, scope: &str) -> Result<(), AccessError> {
    if identity.has_scope(scope) {
        Ok(())
    } else {
        Err(AccessError::InsufficientScope(scope.to_string()))
    }
}
