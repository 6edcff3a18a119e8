// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Access Control Module
//!
//! Two layers, applied in order:
//!
//! 1. **Gates** ([`require_role`], [`require_permission`], [`require_scope`])
//!    look only at the verified identity and run before a handler.
//! 2. **Resource checks** ([`AccessController`]) look at persisted state:
//!    who owns a document, which doctor a patient is assigned to.
//!
//! Failures are user-facing rejections (403/404/409), never 500s, except
//! when the store itself fails.

pub mod controller;
pub mod error;
pub mod gates;

pub use controller::AccessController;
pub use error::AccessError;
pub use gates::{require_permission, require_role, require_scope};
