// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! PatientLink - Doctor/Patient Document Sharing Backend
//!
//! Bearer tokens issued by an external identity provider are verified against
//! its rotating signing keys; a relational access model then decides which
//! doctor may see which patient and which documents.
//!
//! ## Modules
//!
//! - `auth` - Token verification, claim extraction, axum extractors
//! - `access` - Role gates and resource-level access control
//! - `provisioning` - Just-in-time local user creation
//! - `storage` - Persistence (in-memory and redb)
//! - `api` - HTTP API handlers (Axum)

pub mod access;
pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod provisioning;
pub mod state;
pub mod storage;
