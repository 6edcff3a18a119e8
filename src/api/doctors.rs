// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Doctor-facing endpoints: own profile, patient assignment, and the
//! documents of assigned patients.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    auth::DoctorUser,
    error::ApiError,
    models::{
        AssignPatientRequest, CreateDocumentRequest, DocumentResponse, PatientDetailResponse,
        UnassignResponse, UpdateDocumentRequest, UpdateProfileRequest, UserResponse,
    },
    state::AppState,
    storage::{DocumentUpdate, NewDocument, ProfileUpdate, StoredFile},
};

// =============================================================================
// Own profile
// =============================================================================

#[utoipa::path(
    get,
    path = "/v1/doctors/profile",
    tag = "Doctors",
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn get_profile(DoctorUser(doctor): DoctorUser) -> Json<UserResponse> {
    Json(doctor.into())
}

#[utoipa::path(
    put,
    path = "/v1/doctors/profile",
    tag = "Doctors",
    request_body = UpdateProfileRequest,
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn update_profile(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let updated = state
        .store
        .update_profile(&doctor.id, &ProfileUpdate::from(request))?;
    Ok(Json(updated.into()))
}

// =============================================================================
// Patients
// =============================================================================

#[utoipa::path(
    get,
    path = "/v1/doctors/patients",
    tag = "Doctors",
    security(("bearer" = [])),
    responses((status = 200, body = [UserResponse]))
)]
pub async fn list_patients(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let patients = state.store.list_patients_of(&doctor.id)?;
    Ok(Json(patients.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/doctors/patients",
    tag = "Doctors",
    request_body = AssignPatientRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, body = UserResponse),
        (status = 404, description = "Patient not found"),
        (status = 409, description = "Patient is already assigned")
    )
)]
pub async fn assign_patient(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Json(request): Json<AssignPatientRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let patient = state.access.assign_patient(&doctor, &request.patient_id)?;
    Ok(Json(patient.into()))
}

#[utoipa::path(
    get,
    path = "/v1/doctors/patients/{patient_id}",
    tag = "Doctors",
    params(("patient_id" = String, Path, description = "Subject id of the patient")),
    security(("bearer" = [])),
    responses(
        (status = 200, body = PatientDetailResponse),
        (status = 403, description = "Patient is not assigned to the caller"),
        (status = 404, description = "Patient not found")
    )
)]
pub async fn get_patient(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path(patient_id): Path<String>,
) -> Result<Json<PatientDetailResponse>, ApiError> {
    let patient = state.access.patient_for_doctor(&doctor, &patient_id)?;
    let documents_count = state.store.list_documents_by_patient(&patient.id)?.len();
    Ok(Json(PatientDetailResponse {
        patient: patient.into(),
        documents_count,
    }))
}

#[utoipa::path(
    put,
    path = "/v1/doctors/patients/{patient_id}",
    tag = "Doctors",
    params(("patient_id" = String, Path, description = "Subject id of the patient")),
    request_body = UpdateProfileRequest,
    security(("bearer" = [])),
    responses((status = 200, body = UserResponse))
)]
pub async fn update_patient(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path(patient_id): Path<String>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let patient = state.access.patient_for_doctor(&doctor, &patient_id)?;
    let updated = state
        .store
        .update_profile(&patient.id, &ProfileUpdate::from(request))?;
    tracing::info!(doctor_id = %doctor.id, patient_id = %patient.id, "Doctor updated patient profile");
    Ok(Json(updated.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/doctors/patients/{patient_id}",
    tag = "Doctors",
    params(("patient_id" = String, Path, description = "Subject id of the patient")),
    security(("bearer" = [])),
    responses(
        (status = 200, body = UnassignResponse),
        (status = 403, description = "Another doctor holds the assignment"),
        (status = 409, description = "Patient has no doctor")
    )
)]
pub async fn unassign_patient(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path(patient_id): Path<String>,
) -> Result<Json<UnassignResponse>, ApiError> {
    let patient = state.access.unassign_patient(&doctor, &patient_id)?;
    Ok(Json(UnassignResponse {
        message: "Patient unassigned".to_string(),
        patient_id: patient.id,
    }))
}

// =============================================================================
// Patient documents
// =============================================================================

#[utoipa::path(
    get,
    path = "/v1/doctors/patients/{patient_id}/documents",
    tag = "Doctors",
    params(("patient_id" = String, Path, description = "Subject id of the patient")),
    security(("bearer" = [])),
    responses((status = 200, body = [DocumentResponse]))
)]
pub async fn list_patient_documents(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path(patient_id): Path<String>,
) -> Result<Json<Vec<DocumentResponse>>, ApiError> {
    let patient = state.access.patient_for_doctor(&doctor, &patient_id)?;
    let documents = state.store.list_documents_by_patient(&patient.id)?;
    Ok(Json(documents.into_iter().map(DocumentResponse::from).collect()))
}

#[utoipa::path(
    post,
    path = "/v1/doctors/patients/{patient_id}/documents",
    tag = "Doctors",
    params(("patient_id" = String, Path, description = "Subject id of the patient")),
    request_body = CreateDocumentRequest,
    security(("bearer" = [])),
    responses(
        (status = 201, body = DocumentResponse),
        (status = 400, description = "Missing filename"),
        (status = 403, description = "Patient is not assigned to the caller")
    )
)]
pub async fn create_patient_document(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path(patient_id): Path<String>,
    Json(request): Json<CreateDocumentRequest>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let filename = required_filename(&request.filename)?;
    let patient = state.access.patient_for_upload(&doctor, &patient_id)?;

    let document = state.store.insert_document(NewDocument {
        file: StoredFile::for_upload(&patient.id, filename, request.content_type),
        patient_id: patient.id,
        uploaded_by_id: doctor.id.clone(),
        description: request.description,
    })?;
    tracing::info!(
        doctor_id = %doctor.id,
        patient_id = %document.patient_id,
        document_id = document.id,
        "Document registered"
    );
    Ok((StatusCode::CREATED, Json(document.into())))
}

#[utoipa::path(
    get,
    path = "/v1/doctors/patients/{patient_id}/documents/{document_id}",
    tag = "Doctors",
    params(
        ("patient_id" = String, Path, description = "Subject id of the patient"),
        ("document_id" = u64, Path, description = "Document id")
    ),
    security(("bearer" = [])),
    responses(
        (status = 200, body = DocumentResponse),
        (status = 404, description = "Document not found")
    )
)]
pub async fn get_patient_document(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path((patient_id, document_id)): Path<(String, u64)>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state.access.document_for(&doctor, &patient_id, document_id)?;
    Ok(Json(document.into()))
}

#[utoipa::path(
    put,
    path = "/v1/doctors/patients/{patient_id}/documents/{document_id}",
    tag = "Doctors",
    params(
        ("patient_id" = String, Path, description = "Subject id of the patient"),
        ("document_id" = u64, Path, description = "Document id")
    ),
    request_body = UpdateDocumentRequest,
    security(("bearer" = [])),
    responses((status = 200, body = DocumentResponse))
)]
pub async fn update_patient_document(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path((patient_id, document_id)): Path<(String, u64)>,
    Json(request): Json<UpdateDocumentRequest>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let existing = state.access.document_for(&doctor, &patient_id, document_id)?;

    let file = match request.filename.as_deref() {
        Some(name) => Some(StoredFile::for_upload(
            &existing.patient_id,
            required_filename(name)?,
            request.content_type,
        )),
        None => None,
    };
    let update = DocumentUpdate {
        description: request.description,
        file,
    };

    let document = state
        .store
        .update_document(existing.id, &existing.patient_id, update)?;
    Ok(Json(document.into()))
}

#[utoipa::path(
    delete,
    path = "/v1/doctors/patients/{patient_id}/documents/{document_id}",
    tag = "Doctors",
    params(
        ("patient_id" = String, Path, description = "Subject id of the patient"),
        ("document_id" = u64, Path, description = "Document id")
    ),
    security(("bearer" = [])),
    responses((status = 204))
)]
pub async fn delete_patient_document(
    State(state): State<AppState>,
    DoctorUser(doctor): DoctorUser,
    Path((patient_id, document_id)): Path<(String, u64)>,
) -> Result<StatusCode, ApiError> {
    let existing = state.access.document_for(&doctor, &patient_id, document_id)?;
    let removed = state
        .store
        .delete_document(existing.id, &existing.patient_id)?;
    tracing::info!(
        doctor_id = %doctor.id,
        document_id = removed.id,
        storage_key = %removed.storage_key,
        "Document deleted"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn required_filename(filename: &str) -> Result<&str, ApiError> {
    let trimmed = filename.trim();
    if trimmed.is_empty() {
        return Err(ApiError::bad_request("filename must not be empty"));
    }
    Ok(trimmed)
}
