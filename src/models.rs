// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # API Data Models
//!
//! Request and response bodies of the REST API. Persisted records live in
//! [`crate::storage::models`]; the types here are their wire shape.
//!
//! ## Model Categories
//!
//! - **Users**: doctor and patient profiles, assignment requests
//! - **Documents**: document metadata (bodies live in object storage)
//! - **Verification**: doctor-side check of patient details before assignment

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::auth::Role;
use crate::storage::{Document, ProfileUpdate, User};

// =============================================================================
// Users
// =============================================================================

/// A user profile as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct UserResponse {
    /// Subject id from the identity provider
    pub id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Role,
    /// Assigned doctor (patients only)
    pub doctor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            date_of_birth: user.date_of_birth,
            role: user.role,
            doctor_id: user.doctor_id,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Response for GET /v1/auth/me
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeResponse {
    pub user: UserResponse,
    /// Permissions granted by the current token
    pub permissions: Vec<String>,
    /// Scopes granted by the current token
    pub scopes: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ScopedResponse {
    pub message: String,
    pub subject: String,
}

/// Patient profile seen by the assigned doctor.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PatientDetailResponse {
    pub patient: UserResponse,
    pub documents_count: usize,
}

/// Profile fields a user (or the assigned doctor) may edit.
///
/// Blank names are ignored; a blank phone clears the stored number.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

impl From<UpdateProfileRequest> for ProfileUpdate {
    fn from(request: UpdateProfileRequest) -> Self {
        Self {
            first_name: request.first_name,
            last_name: request.last_name,
            phone: request.phone,
            date_of_birth: request.date_of_birth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AssignPatientRequest {
    pub patient_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnassignResponse {
    pub message: String,
    pub patient_id: String,
}

// =============================================================================
// Verification
// =============================================================================

/// Details a doctor believes identify a patient.
///
/// Empty or absent fields are not compared.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifyPatientRequest {
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyPatientResponse {
    pub verified: bool,
    pub patient: UserResponse,
}

// =============================================================================
// Documents
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq, Eq)]
pub struct DocumentResponse {
    pub id: u64,
    pub patient_id: String,
    pub uploaded_by_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub description: Option<String>,
    /// Object storage key of the file body
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentResponse {
    fn from(document: Document) -> Self {
        Self {
            id: document.id,
            patient_id: document.patient_id,
            uploaded_by_id: document.uploaded_by_id,
            filename: document.filename,
            content_type: document.content_type,
            description: document.description,
            storage_key: document.storage_key,
            created_at: document.created_at,
            updated_at: document.updated_at,
        }
    }
}

/// Register a document; the server allocates the storage key.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateDocumentRequest {
    pub filename: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Update a document. A new `filename` replaces the file and allocates a new
/// storage key; a present `description` replaces the old one (blank clears).
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct UpdateDocumentRequest {
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}
