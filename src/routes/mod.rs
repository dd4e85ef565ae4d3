//! Router Module Index
//!
//! Routes are split by area so each router can carry its own guard layer.

/// Anonymous access; published content only.
pub mod public;

/// Member area, guarded by `area.member.enter`.
pub mod authenticated;

/// Admin area, guarded by `area.admin.enter`.
pub mod admin;

/// Super-admin area, guarded by `area.superadmin.enter`.
pub mod superadmin;
