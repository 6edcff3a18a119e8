// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Storage Module
//!
//! Persistence for users and document metadata, behind the [`ClinicalStore`]
//! trait. The access core only issues point queries against it.
//!
//! ## Implementations
//!
//! - [`MemoryStore`] - in-process maps behind a lock (tests, `:memory:`)
//! - [`RedbStore`] - embedded ACID database (pure Rust)
//!
//! ## Invariants
//!
//! Both implementations enforce, on every write:
//!
//! - a doctor never carries a `doctor_id`
//! - `doctor_id` only ever references an existing doctor
//! - documents reference an existing patient and an existing doctor
//! - `doctor_id` changes only through [`ClinicalStore::compare_and_set_doctor`],
//!   which reads and writes inside one write transaction

pub mod memory;
pub mod models;
pub mod redb_store;

pub use memory::MemoryStore;
pub use models::{Document, DocumentUpdate, NewDocument, ProfileUpdate, StoredFile, User};
pub use redb_store::RedbStore;

use crate::auth::Role;

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("not found: {0}")]
    NotFound(String),

    /// A write would break a relational invariant
    #[error("invariant violation: {0}")]
    Invariant(String),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of a conditional `doctor_id` update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapOutcome {
    /// The expected value matched; the updated patient is returned
    Swapped(User),
    /// Someone else got there first; `current` is what is stored now
    Conflict { current: Option<String> },
}

// =============================================================================
// Store Trait
// =============================================================================

/// Persistence collaborator for the access core and the HTTP handlers.
pub trait ClinicalStore: Send + Sync {
    fn find_user(&self, id: &str) -> StoreResult<Option<User>>;

    /// Case-insensitive lookup among patients.
    fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Insert a new user. Fails with [`StoreError::AlreadyExists`] if the id is taken.
    fn insert_user(&self, user: &User) -> StoreResult<()>;

    fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<User>;

    /// Atomically set a patient's `doctor_id` to `new` iff it currently equals `expected`.
    fn compare_and_set_doctor(
        &self,
        patient_id: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<SwapOutcome>;

    /// Patients whose `doctor_id` is `doctor_id`.
    fn list_patients_of(&self, doctor_id: &str) -> StoreResult<Vec<User>>;

    fn insert_document(&self, document: NewDocument) -> StoreResult<Document>;

    fn find_document(&self, id: u64, patient_id: &str) -> StoreResult<Option<Document>>;

    /// Documents of a patient, oldest first.
    fn list_documents_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Document>>;

    fn update_document(
        &self,
        id: u64,
        patient_id: &str,
        update: DocumentUpdate,
    ) -> StoreResult<Document>;

    /// Remove a document and return its last state.
    fn delete_document(&self, id: u64, patient_id: &str) -> StoreResult<Document>;
}

// =============================================================================
// Shared Invariant Checks
// =============================================================================

pub(crate) fn ensure_role(user: Option<&User>, id: &str, role: Role) -> StoreResult<()> {
    match user {
        None => Err(StoreError::NotFound(format!("user {id}"))),
        Some(u) if u.role != role => Err(StoreError::Invariant(format!(
            "user {id} is a {}, expected a {role}",
            u.role
        ))),
        Some(_) => Ok(()),
    }
}

pub(crate) fn ensure_new_user(user: &User) -> StoreResult<()> {
    if user.is_doctor() && user.doctor_id.is_some() {
        return Err(StoreError::Invariant(format!(
            "doctor {} cannot have an assigned doctor",
            user.id
        )));
    }
    if user.doctor_id.is_some() {
        // Assignment only happens through compare_and_set_doctor.
        return Err(StoreError::Invariant(format!(
            "user {} must be created unassigned",
            user.id
        )));
    }
    Ok(())
}

pub(crate) fn ensure_new_document(
    patient: Option<&User>,
    uploader: Option<&User>,
    document: &NewDocument,
) -> StoreResult<()> {
    ensure_role(patient, &document.patient_id, Role::Patient)?;
    ensure_role(uploader, &document.uploaded_by_id, Role::Doctor)
}
