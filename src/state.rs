// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use crate::access::AccessController;
use crate::auth::{ClaimExtractor, TokenVerifier};
use crate::provisioning::UserProvisioner;
use crate::storage::ClinicalStore;

/// Shared application state: the auth pipeline and the store it guards.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<TokenVerifier>,
    pub claims: Arc<ClaimExtractor>,
    pub store: Arc<dyn ClinicalStore>,
    pub access: AccessController,
    pub provisioner: UserProvisioner,
}

impl AppState {
    pub fn new(
        verifier: TokenVerifier,
        claims: ClaimExtractor,
        store: Arc<dyn ClinicalStore>,
    ) -> Self {
        Self {
            verifier: Arc::new(verifier),
            claims: Arc::new(claims),
            access: AccessController::new(store.clone()),
            provisioner: UserProvisioner::new(store.clone()),
            store,
        }
    }
}
