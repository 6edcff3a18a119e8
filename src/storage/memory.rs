// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process store.
//!
//! Used by tests and when `DATABASE_PATH=:memory:`. Nothing survives a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::{
    ensure_new_document, ensure_new_user, ensure_role, ClinicalStore, Document, DocumentUpdate,
    NewDocument, ProfileUpdate, StoreError, StoreResult, SwapOutcome, User,
};
use crate::auth::Role;

#[derive(Default)]
struct Inner {
    users: HashMap<String, User>,
    documents: BTreeMap<u64, Document>,
    next_document_id: u64,
}

/// Maps behind a single lock. Writers hold the write lock across their
/// read-check-write, which makes every mutation atomic.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> StoreResult<RwLockReadGuard<'_, Inner>> {
        self.inner.read().map_err(|_| StoreError::Poisoned)
    }

    fn write(&self) -> StoreResult<RwLockWriteGuard<'_, Inner>> {
        self.inner.write().map_err(|_| StoreError::Poisoned)
    }
}

impl ClinicalStore for MemoryStore {
    fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
        Ok(self.read()?.users.get(id).cloned())
    }

    fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(self
            .read()?
            .users
            .values()
            .find(|u| u.is_patient() && u.email.as_deref() == Some(email.as_str()))
            .cloned())
    }

    fn insert_user(&self, user: &User) -> StoreResult<()> {
        ensure_new_user(user)?;
        let mut inner = self.write()?;
        if inner.users.contains_key(&user.id) {
            return Err(StoreError::AlreadyExists(format!("user {}", user.id)));
        }
        inner.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<User> {
        let mut inner = self.write()?;
        let user = inner
            .users
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("user {id}")))?;
        user.apply_profile(update);
        Ok(user.clone())
    }

    fn compare_and_set_doctor(
        &self,
        patient_id: &str,
        expected: Option<&str>,
        new: Option<&str>,
    ) -> StoreResult<SwapOutcome> {
        let mut inner = self.write()?;

        ensure_role(inner.users.get(patient_id), patient_id, Role::Patient)?;
        if let Some(doctor_id) = new {
            ensure_role(inner.users.get(doctor_id), doctor_id, Role::Doctor)?;
        }

        let patient = inner
            .users
            .get_mut(patient_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {patient_id}")))?;

        if patient.doctor_id.as_deref() != expected {
            return Ok(SwapOutcome::Conflict {
                current: patient.doctor_id.clone(),
            });
        }

        patient.doctor_id = new.map(str::to_string);
        patient.updated_at = Utc::now();
        Ok(SwapOutcome::Swapped(patient.clone()))
    }

    fn list_patients_of(&self, doctor_id: &str) -> StoreResult<Vec<User>> {
        let mut patients: Vec<User> = self
            .read()?
            .users
            .values()
            .filter(|u| u.is_assigned_to(doctor_id))
            .cloned()
            .collect();
        patients.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(patients)
    }

    fn insert_document(&self, document: NewDocument) -> StoreResult<Document> {
        let mut inner = self.write()?;
        ensure_new_document(
            inner.users.get(&document.patient_id),
            inner.users.get(&document.uploaded_by_id),
            &document,
        )?;

        inner.next_document_id += 1;
        let id = inner.next_document_id;
        let document = Document::from_new(id, document);
        inner.documents.insert(id, document.clone());
        Ok(document)
    }

    fn find_document(&self, id: u64, patient_id: &str) -> StoreResult<Option<Document>> {
        Ok(self
            .read()?
            .documents
            .get(&id)
            .filter(|d| d.patient_id == patient_id)
            .cloned())
    }

    fn list_documents_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Document>> {
        Ok(self
            .read()?
            .documents
            .values()
            .filter(|d| d.patient_id == patient_id)
            .cloned()
            .collect())
    }

    fn update_document(
        &self,
        id: u64,
        patient_id: &str,
        update: DocumentUpdate,
    ) -> StoreResult<Document> {
        let mut inner = self.write()?;
        let document = inner
            .documents
            .get_mut(&id)
            .filter(|d| d.patient_id == patient_id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))?;
        document.apply_update(update);
        Ok(document.clone())
    }

    fn delete_document(&self, id: u64, patient_id: &str) -> StoreResult<Document> {
        let mut inner = self.write()?;
        match inner.documents.get(&id) {
            Some(d) if d.patient_id == patient_id => {}
            _ => return Err(StoreError::NotFound(format!("document {id}"))),
        }
        inner
            .documents
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound(format!("document {id}")))
    }
}
