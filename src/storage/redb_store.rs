// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded clinical database backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `users`: subject id → serialized User
//! - `documents`: document id → serialized Document
//! - `doctor_patients`: composite key (doctor|patient) → patient id
//! - `patient_documents`: composite key (patient|document id) → document id
//! - `meta`: key → counter (document id sequence)
//!
//! redb serializes write transactions, so every read-check-write below is
//! atomic with respect to other writers.

use std::path::Path;

use chrono::Utc;
use redb::{Database, ReadableDatabase, ReadableTable, Table, TableDefinition};
use serde::{de::DeserializeOwned, Serialize};

use super::{
    ensure_new_document, ensure_new_user, ensure_role, ClinicalStore, Document, DocumentUpdate,
    NewDocument, ProfileUpdate, StoreError, StoreResult, SwapOutcome, User,
};
use crate::auth::Role;

// =============================================================================
// Table Definitions
// =============================================================================

/// Primary table: subject id → serialized User (JSON bytes).
const USERS: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// Primary table: document id → serialized Document (JSON bytes).
const DOCUMENTS: TableDefinition<u64, &[u8]> = TableDefinition::new("documents");

/// Index for the doctor → patients reverse lookup.
const DOCTOR_PATIENTS: TableDefinition<&[u8], &str> = TableDefinition::new("doctor_patients");

/// Index for listing a patient's documents in id order.
const PATIENT_DOCUMENTS: TableDefinition<&[u8], u64> = TableDefinition::new("patient_documents");

/// Counters.
const META: TableDefinition<&str, u64> = TableDefinition::new("meta");

const NEXT_DOCUMENT_ID: &str = "next_document_id";

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Build the scan prefix for all index entries under `scope`.
///
/// Format: `len(scope) as u32 BE | scope`. The length prefix keeps ids that
/// share a textual prefix (`auth0|a` and `auth0|ab`) from overlapping.
fn make_prefix(scope: &str) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(4 + scope.len());
    prefix.extend_from_slice(&(scope.len() as u32).to_be_bytes());
    prefix.extend_from_slice(scope.as_bytes());
    prefix
}

/// Build a composite index key: scan prefix of `scope` followed by `suffix`.
fn make_index_key(scope: &str, suffix: &[u8]) -> Vec<u8> {
    let mut key = make_prefix(scope);
    key.extend_from_slice(suffix);
    key
}

fn get_json<T, R>(table: &R, key: &str) -> StoreResult<Option<T>>
where
    T: DeserializeOwned,
    R: ReadableTable<&'static str, &'static [u8]>,
{
    match table.get(key)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

fn put_json<T: Serialize>(
    table: &mut Table<'_, &'static str, &'static [u8]>,
    key: &str,
    value: &T,
) -> StoreResult<()> {
    let json = serde_json::to_vec(value)?;
    table.insert(key, json.as_slice())?;
    Ok(())
}

fn get_document<R>(table: &R, id: u64) -> StoreResult<Option<Document>>
where
    R: ReadableTable<u64, &'static [u8]>,
{
    match table.get(id)? {
        Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
        None => Ok(None),
    }
}

// =============================================================================
// RedbStore
// =============================================================================

/// Embedded ACID clinical database.
pub struct RedbStore {
    db: Database,
}

impl RedbStore {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let db = Database::create(path)?;

        // Pre-create all tables so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS)?;
            let _ = write_txn.open_table(DOCUMENTS)?;
            let _ = write_txn.open_table(DOCTOR_PATIENTS)?;
            let _ = write_txn.open_table(PATIENT_DOCUMENTS)?;
            let _ = write_txn.open_table(META)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }
}

impl ClinicalStore for RedbStore {
    fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;
        get_json(&table, id)
    }

    fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS)?;

        for entry in table.iter()? {
            let (_, value) = entry?;
            let user: User = serde_json::from_slice(value.value())?;
            if user.is_patient() && user.email.as_deref() == Some(email.as_str()) {
                return Ok(Some(user));
            }
        }
        Ok(None)
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        ensure_new_user(user)?;
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(USERS)?;
            if table.get(user.id.as_str())?.is_some() {
                return Err(StoreError::AlreadyExists(format!("user {}", user.id)));
            }
            put_json(&mut table, &user.id, user)?;
        }
        write_txn.commit()?;
        Ok(())
    }

    fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<User> {
        let write_txn = self.db.begin_write()?;
        let user = {
            let mut table = write_txn.open_table(USERS)?;
            let mut user: User =
                get_json(&table, id)?.ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
            user.apply_profile(update);
            put_json(&mut table, id, &user)?;
            user
        };
        write_txn.commit()?;
        Ok(user)
    }

    fn compare_and_set_doctor(
        &self,
        patient_id: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<SwapOutcome> {
        let write_txn = self.db.begin_write()?;
        let outcome = {
            let mut users = write_txn.open_table(USERS)?;
            let mut index = write_txn.open_table(DOCTOR_PATIENTS)?;

            let patient: Option<User> = get_json(&users, patient_id)?;
            ensure_role(patient.as_ref(), patient_id, Role::Patient)?;
            if let Some(doctor_id) = new {
                let doctor: Option<User> = get_json(&users, doctor_id)?;
                ensure_role(doctor.as_ref(), doctor_id, Role::Doctor)?;
            }
            let mut patient =
                patient.ok_or_else(|| StoreError::NotFound(format!("user {patient_id}")))?;

            if patient.doctor_id.as_deref() != expected {
                SwapOutcome::Conflict {
                    current: patient.doctor_id,
                }
            } else {
                if let Some(old) = patient.doctor_id.as_deref() {
                    index.remove(make_index_key(old, patient_id.as_bytes()).as_slice())?;
                }
                if let Some(doctor_id) = new {
                    index.insert(
                        make_index_key(doctor_id, patient_id.as_bytes()).as_slice(),
                        patient_id,
                    )?;
                }
                patient.doctor_id = new.map(str::to_string);
                patient.updated_at = Utc::now();
                put_json(&mut users, patient_id, &patient)?;
                SwapOutcome::Swapped(patient)
            }
        };
        write_txn.commit()?;
        Ok(outcome)
    }

    fn list_patients_of(&self, doctor_id: &str) -> StoreResult<Vec<User>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(DOCTOR_PATIENTS)?;
        let users = read_txn.open_table(USERS)?;

        let prefix = make_prefix(doctor_id);
        let mut patients = Vec::new();
        for entry in index.range(prefix.as_slice()..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if let Some(patient) = get_json::<User, _>(&users, value.value())? {
                patients.push(patient);
            }
        }
        Ok(patients)
    }

    fn insert_document(&self, document: NewDocument) -> StoreResult<Document> {
        let write_txn = self.db.begin_write()?;
        let document = {
            let users = write_txn.open_table(USERS)?;
            let patient: Option<User> = get_json(&users, &document.patient_id)?;
            let uploader: Option<User> = get_json(&users, &document.uploaded_by_id)?;
            ensure_new_document(patient.as_ref(), uploader.as_ref(), &document)?;

            let mut meta = write_txn.open_table(META)?;
            let id = meta.get(NEXT_DOCUMENT_ID)?.map(|v| v.value()).unwrap_or(0) + 1;
            meta.insert(NEXT_DOCUMENT_ID, id)?;

            let document = Document::from_new(id, document);
            let json = serde_json::to_vec(&document)?;
            let mut documents = write_txn.open_table(DOCUMENTS)?;
            documents.insert(id, json.as_slice())?;

            let mut index = write_txn.open_table(PATIENT_DOCUMENTS)?;
            index.insert(
                make_index_key(&document.patient_id, &id.to_be_bytes()).as_slice(),
                id,
            )?;
            document
        };
        write_txn.commit()?;
        Ok(document)
    }

    fn find_document(&self, id: u64, patient_id: &str) -> StoreResult<Option<Document>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(DOCUMENTS)?;
        Ok(get_document(&table, id)?.filter(|d| d.patient_id == patient_id))
    }

    fn list_documents_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Document>> {
        let read_txn = self.db.begin_read()?;
        let index = read_txn.open_table(PATIENT_DOCUMENTS)?;
        let documents = read_txn.open_table(DOCUMENTS)?;

        let prefix = make_prefix(patient_id);
        let mut results = Vec::new();
        for entry in index.range(prefix.as_slice()..)? {
            let (key, value) = entry?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            if let Some(document) = get_document(&documents, value.value())? {
                results.push(document);
            }
        }
        Ok(results)
    }

    fn update_document(
        &self,
        id: u64,
        patient_id: &str,
        update: DocumentUpdate,
    ) -> StoreResult<Document> {
        let write_txn = self.db.begin_write()?;
        let document = {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let mut document = get_document(&table, id)?
                .filter(|d| d.patient_id == patient_id)
                .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
            document.apply_update(update);
            let json = serde_json::to_vec(&document)?;
            table.insert(id, json.as_slice())?;
            document
        };
        write_txn.commit()?;
        Ok(document)
    }

    fn delete_document(&self, id: u64, patient_id: &str) -> StoreResult<Document> {
        let write_txn = self.db.begin_write()?;
        let document = {
            let mut table = write_txn.open_table(DOCUMENTS)?;
            let document = get_document(&table, id)?
                .filter(|d| d.patient_id == patient_id)
                .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
            table.remove(id)?;

            let mut index = write_txn.open_table(PATIENT_DOCUMENTS)?;
            index.remove(make_index_key(patient_id, &id.to_be_bytes()).as_slice())?;
            document
        };
        write_txn.commit()?;
        Ok(document)
    }
}
