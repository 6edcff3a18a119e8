// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Just-in-time creation of local users for verified identities.

use std::sync::Arc;

use crate::access::AccessError;
use crate::auth::{Identity, ProfileHints};
use crate::storage::{ClinicalStore, StoreError, User};

/// Find-or-create of the local [`User`] for an identity.
#[derive(Clone)]
pub struct UserProvisioner {
    store: Arc<dyn ClinicalStore>,
}

impl UserProvisioner {
    pub fn new(store: Arc<dyn ClinicalStore>) -> Self {
        Self { store }
    }

    /// Return the user for `identity`, creating it on first sight.
    pub fn provision(&self, identity: &Identity) -> Result<User, AccessError> {
        self.provision_with_outcome(identity).map(|(user, _)| user)
    }

    /// Like [`Self::provision`], also reporting whether the user was created.
    ///
    /// Existing users are returned unchanged. A user created concurrently by
    /// another request is re-read and returned, never reported as an error.
    pub fn provision_with_outcome(&self, identity: &Identity) -> Result<(User, bool), AccessError> {
        if let Some(user) = self.store.find_user(&identity.subject)? {
            return Ok((user, false));
        }

        let role = identity.resolved_role().ok_or(AccessError::NoRole)?;
        let (first_name, last_name) = derive_names(&identity.profile);
        let user = User::new(
            identity.subject.clone(),
            role,
            identity.email.clone(),
            first_name,
            last_name,
        );

        match self.store.insert_user(&user) {
            Ok(()) => {
                tracing::info!(user_id = %user.id, role = %role, "Provisioned new user");
                Ok((user, true))
            }
            Err(StoreError::AlreadyExists(_)) => {
                tracing::debug!(user_id = %user.id, "Lost provisioning race, re-reading user");
                let existing = self.store.find_user(&identity.subject)?.ok_or_else(|| {
                    AccessError::Store(StoreError::NotFound(format!("user {}", identity.subject)))
                })?;
                Ok((existing, false))
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// First/last name from provider hints.
///
/// `given_name`/`family_name` when present, else `name` split into first word
/// and remainder, else empty strings.
fn derive_names(profile: &ProfileHints) -> (String, String) {
    let given = profile.given_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let family = profile.family_name.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if given.is_some() || family.is_some() {
        return (
            given.unwrap_or_default().to_string(),
            family.unwrap_or_default().to_string(),
        );
    }

    let mut words = profile.name.as_deref().unwrap_or_default().split_whitespace();
    let first = words.next().unwrap_or_default().to_string();
    let rest = words.collect::<Vec<_>>().join(" ");
    (first, rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::storage::{
        Document, DocumentUpdate, MemoryStore, NewDocument, ProfileUpdate, StoreResult,
        SwapOutcome,
    };
    use std::sync::Barrier;

    fn identity(sub: &str, roles: &[&str]) -> Identity {
        Identity {
            subject: sub.into(),
            email: Some(format!("{}@example.com", sub.replace('|', "_"))),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: vec![],
            scopes: Default::default(),
            profile: ProfileHints::default(),
        }
    }

    #[test]
    fn creates_user_on_first_sight() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = UserProvisioner::new(store.clone());

        let (user, created) = provisioner
            .provision_with_outcome(&identity("auth0|p1", &["patient"]))
            .unwrap();
        assert!(created);
        assert_eq!(user.role, Role::Patient);
        assert_eq!(user.doctor_id, None);
        assert_eq!(user.first_name, "");
        assert_eq!(user.email.as_deref(), Some("auth0_p1@example.com"));
        assert!(store.find_user("auth0|p1").unwrap().is_some());
    }

    #[test]
    fn existing_user_is_returned_unchanged() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = UserProvisioner::new(store.clone());
        provisioner.provision(&identity("auth0|p1", &["patient"])).unwrap();
        store
            .update_profile(
                "auth0|p1",
                &ProfileUpdate {
                    first_name: Some("Ada".into()),
                    ..Default::default()
                },
            )
            .unwrap();

        // Roles in later tokens do not rewrite the stored role.
        let (user, created) = provisioner
            .provision_with_outcome(&identity("auth0|p1", &["doctor"]))
            .unwrap();
        assert!(!created);
        assert_eq!(user.role, Role::Patient);
        assert_eq!(user.first_name, "Ada");
    }

    #[test]
    fn doctor_wins_tie_break() {
        let provisioner = UserProvisioner::new(Arc::new(MemoryStore::new()));
        let user = provisioner
            .provision(&identity("auth0|both", &["patient", "doctor"]))
            .unwrap();
        assert_eq!(user.role, Role::Doctor);
        assert_eq!(user.doctor_id, None);
    }

    #[test]
    fn no_role_is_rejected() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = UserProvisioner::new(store.clone());
        assert!(matches!(
            provisioner.provision(&identity("auth0|x", &["nurse"])),
            Err(AccessError::NoRole)
        ));
        assert!(store.find_user("auth0|x").unwrap().is_none());
    }

    #[test]
    fn names_come_from_hints() {
        let hints = ProfileHints {
            given_name: Some("Ada".into()),
            family_name: Some("Lovelace".into()),
            name: Some("Countess of Lovelace".into()),
        };
        assert_eq!(derive_names(&hints), ("Ada".into(), "Lovelace".into()));

        let hints = ProfileHints {
            name: Some("  Grace  Brewster Hopper ".into()),
            ..Default::default()
        };
        assert_eq!(derive_names(&hints), ("Grace".into(), "Brewster Hopper".into()));

        assert_eq!(derive_names(&ProfileHints::default()), (String::new(), String::new()));
    }

    #[test]
    fn concurrent_first_requests_create_one_row() {
        let store = Arc::new(MemoryStore::new());
        let provisioner = UserProvisioner::new(store.clone());
        let barrier = Arc::new(Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let provisioner = provisioner.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    provisioner
                        .provision_with_outcome(&identity("auth0|racer", &["patient"]))
                        .unwrap()
                })
            })
            .collect();

        let results: Vec<(User, bool)> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(results.iter().filter(|(_, created)| *created).count(), 1);
        let first = &results[0].0;
        assert!(results.iter().all(|(u, _)| u == first));
    }

    /// Store whose first lookup misses even though the row exists, forcing the
    /// insert-conflict path deterministically.
    struct RacingStore {
        inner: MemoryStore,
        missed: std::sync::atomic::AtomicBool,
    }

    impl ClinicalStore for RacingStore {
        fn find_user(&self, id: &str) -> StoreResult<Option<User>> {
            if !self.missed.swap(true, std::sync::atomic::Ordering::SeqCst) {
                return Ok(None);
            }
            self.inner.find_user(id)
        }
        fn find_patient_by_email(&self, email: &str) -> StoreResult<Option<User>> {
            self.inner.find_patient_by_email(email)
        }
        fn insert_user(&self, user: &User) -> StoreResult<()> {
            self.inner.insert_user(user)
        }
        fn update_profile(&self, id: &str, update: &ProfileUpdate) -> StoreResult<User> {
            self.inner.update_profile(id, update)
        }
        fn compare_and_set_doctor(
            &self,
            patient_id: &str,
            expected: Option<&str>,
            new: Option<&str>,
        ) -> StoreResult<SwapOutcome> {
            self.inner.compare_and_set_doctor(patient_id, expected, new)
        }
        fn list_patients_of(&self, doctor_id: &str) -> StoreResult<Vec<User>> {
            self.inner.list_patients_of(doctor_id)
        }
        fn insert_document(&self, document: NewDocument) -> StoreResult<Document> {
            self.inner.insert_document(document)
        }
        fn find_document(&self, id: u64, patient_id: &str) -> StoreResult<Option<Document>> {
            self.inner.find_document(id, patient_id)
        }
        fn list_documents_by_patient(&self, patient_id: &str) -> StoreResult<Vec<Document>> {
            self.inner.list_documents_by_patient(patient_id)
        }
        fn update_document(
            &self,
            id: u64,
            patient_id: &str,
            update: DocumentUpdate,
        ) -> StoreResult<Document> {
            self.inner.update_document(id, patient_id, update)
        }
        fn delete_document(&self, id: u64, patient_id: &str) -> StoreResult<Document> {
            self.inner.delete_document(id, patient_id)
        }
    }

    #[test]
    fn insert_conflict_returns_competing_row() {
        let inner = MemoryStore::new();
        inner
            .insert_user(&User::new("auth0|p1", Role::Patient, None, "Winner", ""))
            .unwrap();

        let provisioner = UserProvisioner::new(Arc::new(RacingStore {
            inner,
            missed: Default::default(),
        }));
        let (user, created) = provisioner
            .provision_with_outcome(&identity("auth0|p1", &["patient"]))
            .unwrap();
        assert!(!created);
        assert_eq!(user.first_name, "Winner");
    }
}
