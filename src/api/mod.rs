// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    auth::Role,
    models::{
        AssignPatientRequest, CreateDocumentRequest, DocumentResponse, MeResponse,
        PatientDetailResponse, ScopedResponse, UnassignResponse, UpdateDocumentRequest,
        UpdateProfileRequest, UserResponse, VerifyPatientRequest, VerifyPatientResponse,
    },
    state::AppState,
};

pub mod auth;
pub mod doctors;
pub mod health;
pub mod patients;

pub fn router(state: AppState, cors_origins: &[String]) -> Router {
    let v1_routes = Router::new()
        .route("/auth/me", get(auth::me))
        .route("/auth/private-scoped", get(auth::private_scoped))
        .route(
            "/doctors/profile",
            get(doctors::get_profile).put(doctors::update_profile),
        )
        .route(
            "/doctors/patients",
            get(doctors::list_patients).post(doctors::assign_patient),
        )
        .route(
            "/doctors/patients/{patient_id}",
            get(doctors::get_patient)
                .put(doctors::update_patient)
                .delete(doctors::unassign_patient),
        )
        .route(
            "/doctors/patients/{patient_id}/documents",
            get(doctors::list_patient_documents).post(doctors::create_patient_document),
        )
        .route(
            "/doctors/patients/{patient_id}/documents/{document_id}",
            get(doctors::get_patient_document)
                .put(doctors::update_patient_document)
                .delete(doctors::delete_patient_document),
        )
        .route("/patients/verify-details", post(patients::verify_details))
        .route(
            "/patients/profile",
            get(patients::get_profile).put(patients::update_profile),
        )
        .route("/patients/doctor", get(patients::get_doctor))
        .route("/patients/documents", get(patients::list_documents))
        .route(
            "/patients/documents/{document_id}",
            get(patients::get_document),
        );

    Router::new()
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
        .nest("/v1", v1_routes)
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(cors_layer(cors_origins))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

/// CORS for the configured origins; `*` allows any origin.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers(Any);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    cors.allow_origin(allowed)
}

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::liveness,
        health::readiness,
        auth::me,
        auth::private_scoped,
        doctors::get_profile,
        doctors::update_profile,
        doctors::list_patients,
        doctors::assign_patient,
        doctors::get_patient,
        doctors::update_patient,
        doctors::unassign_patient,
        doctors::list_patient_documents,
        doctors::create_patient_document,
        doctors::get_patient_document,
        doctors::update_patient_document,
        doctors::delete_patient_document,
        patients::verify_details,
        patients::get_profile,
        patients::update_profile,
        patients::get_doctor,
        patients::list_documents,
        patients::get_document
    ),
    components(
        schemas(
            Role,
            UserResponse,
            MeResponse,
            ScopedResponse,
            PatientDetailResponse,
            UpdateProfileRequest,
            AssignPatientRequest,
            UnassignResponse,
            VerifyPatientRequest,
            VerifyPatientResponse,
            DocumentResponse,
            CreateDocumentRequest,
            UpdateDocumentRequest,
            health::HealthResponse,
            health::ReadyResponse,
            health::HealthChecks
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and readiness probes"),
        (name = "Auth", description = "Current identity"),
        (name = "Doctors", description = "Doctor profile, patient assignment and patient documents"),
        (name = "Patients", description = "Patient profile, care team and own documents")
    )
)]
struct ApiDoc;
