// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! User roles for authorization.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// User roles for authorization.
///
/// ## Roles
///
/// - `Doctor` - Manages assigned patients and uploads their documents
/// - `Patient` - Reads own profile, own documents and assigned doctor
///
/// The set is closed: a role claim that is neither of these is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Clinician that can be assigned patients
    Doctor,
    /// Patient, assigned to at most one doctor
    Patient,
}

impl Role {
    /// Parse role from string (case-insensitive).
    /// Used when reading the namespaced roles claim.
    pub fn from_str(s: &str) -> Option<Role> {
        match s.trim().to_lowercase().as_str() {
            "doctor" => Some(Role::Doctor),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }

    /// Lowercase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Doctor => "doctor",
            Role::Patient => "patient",
        }
    }

    /// Resolve the single local role for a set of role claims.
    ///
    /// Doctor wins when both roles are present. Returns `None` when neither is.
    pub fn resolve<S: AsRef<str>>(claimed: &[S]) -> Option<Role> {
        let parsed: Vec<Role> = claimed
            .iter()
            .filter_map(|r| Role::from_str(r.as_ref()))
            .collect();

        if parsed.contains(&Role::Doctor) {
            Some(Role::Doctor)
        } else if parsed.contains(&Role::Patient) {
            Some(Role::Patient)
        } else {
            None
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
