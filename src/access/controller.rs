// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Resource-level authorization over the doctor/patient/document model.
//!
//! ## Rules
//!
//! - A patient sees only documents they own
//! - A doctor sees a patient, and that patient's documents, only while the
//!   patient's `doctor_id` points at them
//! - Assignment moves `doctor_id` from absent to a doctor; unassignment moves
//!   it back, and only the assigned doctor may do that
//!
//! Every check reads current state from the store; nothing is cached across
//! requests.

use std::sync::Arc;

use super::AccessError;
use crate::auth::Role;
use crate::storage::{ClinicalStore, Document, StoreError, SwapOutcome, User};

/// Resource predicates and the assignment state machine.
#[derive(Clone)]
pub struct AccessController {
    store: Arc<dyn ClinicalStore>,
}

impl AccessController {
    pub fn new(store: Arc<dyn ClinicalStore>) -> Self {
        Self { store }
    }

    // =========================================================================
    // Predicates
    // =========================================================================

    /// Whether `user` may read `document`.
    pub fn can_access_document(&self, user: &User, document: &Document) -> Result<bool, AccessError> {
        match user.role {
            Role::Patient => Ok(document.patient_id == user.id),
            Role::Doctor => self.is_assigned(user, &document.patient_id),
        }
    }

    /// Whether `doctor` may register documents for the patient.
    pub fn can_upload_for_patient(&self, doctor: &User, patient_id: &str) -> Result<bool, AccessError> {
        self.is_assigned(doctor, patient_id)
    }

    /// Whether `doctor` may read or edit the patient's profile.
    pub fn can_access_patient(&self, doctor: &User, patient_id: &str) -> Result<bool, AccessError> {
        self.is_assigned(doctor, patient_id)
    }

    fn is_assigned(&self, doctor: &User, patient_id: &str) -> Result<bool, AccessError> {
        if !doctor.is_doctor() {
            return Ok(false);
        }
        Ok(self
            .store
            .find_user(patient_id)?
            .is_some_and(|patient| patient.is_assigned_to(&doctor.id)))
    }

    // =========================================================================
    // Guarded lookups
    // =========================================================================

    /// Load a patient the doctor may access.
    ///
    /// `NotFound` if there is no such patient, `Forbidden` if it belongs to
    /// someone else or to nobody.
    pub fn patient_for_doctor(&self, doctor: &User, patient_id: &str) -> Result<User, AccessError> {
        let patient = self.load_patient(patient_id)?;
        if !doctor.is_doctor() || !patient.is_assigned_to(&doctor.id) {
            return Err(AccessError::forbidden("You cannot access this patient"));
        }
        Ok(patient)
    }

    /// Like [`Self::patient_for_doctor`], but phrased for document uploads.
    pub fn patient_for_upload(&self, doctor: &User, patient_id: &str) -> Result<User, AccessError> {
        let patient = self.load_patient(patient_id)?;
        if !self.can_upload_for_patient(doctor, &patient.id)? {
            return Err(AccessError::forbidden(
                "You cannot upload documents for this patient",
            ));
        }
        Ok(patient)
    }

    /// Load a document of `patient_id` that `user` may access.
    pub fn document_for(
        &self,
        user: &User,
        patient_id: &str,
        document_id: u64,
    ) -> Result<Document, AccessError> {
        let document = self
            .store
            .find_document(document_id, patient_id)?
            .ok_or_else(|| AccessError::not_found("Document not found"))?;
        if !self.can_access_document(user, &document)? {
            return Err(AccessError::forbidden("You cannot access this document"));
        }
        Ok(document)
    }

    fn load_patient(&self, patient_id: &str) -> Result<User, AccessError> {
        self.store
            .find_user(patient_id)?
            .filter(User::is_patient)
            .ok_or_else(|| AccessError::not_found("Patient not found"))
    }

    // =========================================================================
    // Assignment
    // =========================================================================

    /// Link an unassigned patient to `doctor`.
    ///
    /// First writer wins: the store swaps `doctor_id` from absent to the
    /// doctor atomically, and any existing assignment (including to this same
    /// doctor) is `AlreadyAssigned`.
    pub fn assign_patient(&self, doctor: &User, patient_id: &str) -> Result<User, AccessError> {
        if !doctor.is_doctor() {
            return Err(AccessError::InsufficientRole(Role::Doctor));
        }
        self.load_patient(patient_id)?;

        match self
            .store
            .compare_and_set_doctor(patient_id, None, Some(&doctor.id))
            .map_err(not_found_as_access)?
        {
            SwapOutcome::Swapped(patient) => {
                tracing::info!(doctor_id = %doctor.id, patient_id = %patient_id, "Patient assigned");
                Ok(patient)
            }
            SwapOutcome::Conflict { current } => {
                tracing::debug!(
                    doctor_id = %doctor.id,
                    patient_id = %patient_id,
                    current = ?current,
                    "Assignment rejected, patient already has a doctor"
                );
                Err(AccessError::AlreadyAssigned)
            }
        }
    }

    /// Release a patient from `doctor`.
    ///
    /// `NotAssigned` if the patient has no doctor; `Forbidden` if another
    /// doctor holds the assignment.
    pub fn unassign_patient(&self, doctor: &User, patient_id: &str) -> Result<User, AccessError> {
        if !doctor.is_doctor() {
            return Err(AccessError::InsufficientRole(Role::Doctor));
        }
        let patient = self.load_patient(patient_id)?;
        check_holder(doctor, patient.doctor_id.as_deref())?;

        match self
            .store
            .compare_and_set_doctor(patient_id, Some(&doctor.id), None)
            .map_err(not_found_as_access)?
        {
            SwapOutcome::Swapped(patient) => {
                tracing::info!(doctor_id = %doctor.id, patient_id = %patient_id, "Patient unassigned");
                Ok(patient)
            }
            // Changed between our read and the swap; report what is there now.
            SwapOutcome::Conflict { current } => {
                check_holder(doctor, current.as_deref())?;
                Err(AccessError::NotAssigned)
            }
        }
    }
}

fn check_holder(doctor: &User, current: Option<&str>) -> Result<(), AccessError> {
    match current {
        None => Err(AccessError::NotAssigned),
        Some(id) if id == doctor.id => Ok(()),
        Some(_) => Err(AccessError::forbidden("You cannot unassign this patient")),
    }
}

fn not_found_as_access(e: StoreError) -> AccessError {
    match e {
        StoreError::NotFound(_) => AccessError::not_found("Patient not found"),
        other => AccessError::Store(other),
    }
}
