// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Persisted records: users and document metadata.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::Role;

// =============================================================================
// User
// =============================================================================

/// Local user record, keyed by the provider subject id.
///
/// A doctor never has a `doctor_id`. A patient has at most one, and it always
/// references a user with role doctor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
    pub role: Role,
    pub doctor_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    /// Create a new, unassigned user.
    pub fn new(
        id: impl Into<String>,
        role: Role,
        email: Option<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            email: email.map(|e| e.trim().to_lowercase()),
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            date_of_birth: None,
            role,
            doctor_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_doctor(&self) -> bool {
        self.role == Role::Doctor
    }

    pub fn is_patient(&self) -> bool {
        self.role == Role::Patient
    }

    /// Whether this user is a patient currently assigned to `doctor_id`.
    pub fn is_assigned_to(&self, doctor_id: &str) -> bool {
        self.is_patient() && self.doctor_id.as_deref() == Some(doctor_id)
    }

    /// Apply profile changes. Never touches `role` or `doctor_id`.
    pub fn apply_profile(&mut self, update: &ProfileUpdate) {
        if let Some(first) = non_blank(update.first_name.as_deref()) {
            self.first_name = first.to_string();
        }
        if let Some(last) = non_blank(update.last_name.as_deref()) {
            self.last_name = last.to_string();
        }
        if let Some(phone) = update.phone.as_deref() {
            self.phone = non_blank(Some(phone)).map(str::to_string);
        }
        if let Some(dob) = update.date_of_birth {
            self.date_of_birth = Some(dob);
        }
        self.updated_at = Utc::now();
    }
}

/// Editable profile fields.
///
/// Blank names are ignored; a blank phone clears the stored one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Document
// =============================================================================

/// File metadata for a stored object. The bytes live in object storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub filename: String,
    pub content_type: Option<String>,
    /// Object key, `documents/<patient_id>/<uuid><ext>`
    pub storage_key: String,
}

impl StoredFile {
    /// Allocate a fresh object key for a file uploaded for `patient_id`.
    pub fn for_upload(patient_id: &str, filename: &str, content_type: Option<String>) -> Self {
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{e}"))
            .unwrap_or_default();

        Self {
            filename: filename.to_string(),
            content_type,
            storage_key: format!("documents/{}/{}{}", patient_id, Uuid::new_v4(), ext),
        }
    }
}

/// Document metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Store-assigned, monotonically increasing
    pub id: u64,
    pub patient_id: String,
    pub uploaded_by_id: String,
    pub filename: String,
    pub content_type: Option<String>,
    pub description: Option<String>,
    pub storage_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document {
    pub(crate) fn from_new(id: u64, new: NewDocument) -> Self {
        let now = Utc::now();
        Self {
            id,
            patient_id: new.patient_id,
            uploaded_by_id: new.uploaded_by_id,
            filename: new.file.filename,
            content_type: new.file.content_type,
            description: clean_description(new.description),
            storage_key: new.file.storage_key,
            created_at: now,
            updated_at: now,
        }
    }

    pub(crate) fn apply_update(&mut self, update: DocumentUpdate) {
        if let Some(description) = update.description {
            self.description = clean_description(Some(description));
        }
        if let Some(file) = update.file {
            self.filename = file.filename;
            self.content_type = file.content_type;
            self.storage_key = file.storage_key;
        }
        self.updated_at = Utc::now();
    }
}

/// Input for registering a document.
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub patient_id: String,
    pub uploaded_by_id: String,
    pub file: StoredFile,
    pub description: Option<String>,
}

/// Document changes. A present description replaces (blank clears).
#[derive(Debug, Clone, Default)]
pub struct DocumentUpdate {
    pub description: Option<String>,
    pub file: Option<StoredFile>,
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}
