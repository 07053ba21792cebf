//! Canonical identifiers for ledger entities.
//!
//! Every entity handled by the ledger (attendance records, absence reasons, patients,
//! scheduling periods, groups and goals) is identified by a UUID. To keep identifiers
//! comparable across storage files, API payloads and log lines, the ledger uses one
//! *canonical* textual form: **32 lowercase hexadecimal characters** (no hyphens).
//!
//! This crate provides:
//! - [`CanonicalUuid`], a wrapper that guarantees the canonical form once constructed.
//! - One newtype per entity kind ([`AttendanceId`], [`PatientId`], ...) so that a patient
//!   identifier cannot be passed where a scheduling-period identifier is expected.
//!
//! ## Canonical UUID form
//! - Length: 32
//! - Characters: `0-9` and `a-f` only
//! - Example: `550e8400e29b41d4a716446655440000`
//!
//! Externally supplied identifiers must already be canonical. Hyphenated or uppercase
//! values are rejected rather than normalised.

mod id;

pub use id::{AttendanceId, CanonicalUuid, GoalId, GroupId, PatientId, PeriodId, ReasonId};

/// Error type for identifier parsing.
#[derive(Debug, thiserror::Error)]
pub enum IdError {
    /// Invalid input provided
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// Result type for identifier operations.
pub type IdResult<T> = Result<T, IdError>;
