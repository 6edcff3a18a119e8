// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Patient-facing endpoints, plus the doctor-side detail check used before
//! assignment.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::{DoctorUser, PatientUser},
    error::ApiError,
    models::{
        DocumentResponse, UpdateProfileRequest, UserResponse, VerifyPatientRequest,
        VerifyPatientResponse,
    },
    state::AppState,
    storage::{ProfileUpdate, User},
};

#[utoipa::path(
    post,
    path = "/v1/patients/verify-details",
    tag = "Patients",
    request_body = VerifyPatientRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, body = VerifyPatientResponse),
        (status = 400, description = "Details do not match the patient"),
        (status = 404, description = "No patient with this email")
    )
)]
pub async fn verify_details(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Json(request): Json<VerifyPatientRequest>,
) -> Result<Json<VerifyPatientResponse>, ApiError> {
    let patient = state
        .store
        .find_patient_by_email(&request.email)?
        .ok_or_else(|| ApiError::not_found("No patient found with this email"))?;

    let mismatches = detail_mismatches(&patient, &request);
    if !mismatches.is_empty() {
        tracing::debug!(doctor_id = %doctor.id, fields = ?mismatches, "Patient details mismatch");
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "details_mismatch",
            format!("Patient details do not match: {}", mismatches.join(", ")),
        ));
    }

    Ok(Json(VerifyPatientResponse {
        verified: true,
        patient: patient.into(),
    }))
}

/// Fields of `request` that disagree with the stored patient.
///
/// Names compare trimmed and case-insensitively, phone numbers by digits only.
/// Empty request fields are skipped; a requested field the patient never
/// filled in counts as a mismatch.
fn detail_mismatches(patient: &User, request: &VerifyPatientRequest) -> Vec<&'static str> {
    let mut mismatches = Vec::new();

    let first = request.first_name.trim();
    if !first.is_empty() && !first.eq_ignore_ascii_case(patient.first_name.trim()) {
        mismatches.push("first_name");
    }
    let last = request.last_name.trim();
    if !last.is_empty() && !last.eq_ignore_ascii_case(patient.last_name.trim()) {
        mismatches.push("last_name");
    }

    let wanted_phone = request.phone.as_deref().map(digits).unwrap_or_default();
    if !wanted_phone.is_empty() {
        let stored = patient.phone.as_deref().map(digits).unwrap_or_default();
        if stored != wanted_phone {
            mismatches.push("phone");
        }
    }

    if let Some(dob) = request.date_of_birth {
        if patient.date_of_birth != Some(dob) {
            mismatches.push("date_of_birth");
        }
    }

    mismatches
}

fn digits(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

// =============================================================================
// Own profile and care team
// =============================================================================

#[utoipa::path(
    get,
    path = "/v1/patients/profile",
    tag = "Patients",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn get_profile(PatientUser(patient): PatientUser) -> Json<UserResponse> {
    Json(patient.into())
}

#[utoipa::path(
    put,
    path = "/v1/patients/profile",
    tag = "Patients",
    request_body = UpdateProfileRequest,
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    PatientUser(patient): PatientUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .store
        .update_profile(&patient.id, &ProfileUpdate::from(request))?;
    Ok(Json(updated.into()))
}

#[utoipa::path(
    get,
    path = "/v1/patients/doctor",
    tag = "Patients",
    security(("bearer" = [])),
    responses(
        (status = 200, body = UserResponse),
        (status = 404, description = "No doctor assigned")
    )
)]
pub async fn get_doctor(
    State(state): State<AppState>,
    PatientUser(patient): PatientUser,
) -> Result<Json<UserResponse>, ApiError> {
    let doctor_id = patient
        .doctor_id
        .ok_or_else(|| ApiError::not_found("No doctor assigned"))?;
    let doctor = state
        .store
        .find_user(&doctor_id)?
        .ok_or_else(|| ApiError::not_found("No doctor assigned"))?;
    Ok(Json(doctor.into()))
}

// =============================================================================
// Own documents
// =============================================================================

#[utoipa::path(
    get,
    path = "/v1/patients/documents",
    tag = "Patients",
    security(("bearer" = [])),
    responses((status = 200, body = [DocumentResponse]))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    PatientUser(patient): PatientUser,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let documents = state.store.list_documents_by_patient(&patient.id)?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/v1/patients/documents/{document_id}",
    tag = "Patients",
    params(("document_id" = u64, Path, description = "Document id")),
    security(("bearer" = [])),
    responses(
        (status = 200, body = DocumentResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_document(
    State(state): State<AppState>,
    PatientUser(patient): PatientUser,
    Path(document_id): Path<u64>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state.access.document_for(&patient, &patient.id, document_id)?;
    Ok(Json(document.into()))
}
