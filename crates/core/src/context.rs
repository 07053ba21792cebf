//! Explicit caller context for mutating operations.
//!
//! Ledger operations never consult ambient session state. Whoever calls into the core passes
//! the acting user (when one must be recorded) and the reference time for the operation.

use chrono::{DateTime, Utc};
use ledger_types::NonEmptyText;

/// Identity and clock for a single ledger call.
#[derive(Clone, Debug)]
pub struct CallerContext {
    /// The user performing the operation, if known.
    pub actor: Option<NonEmptyText>,
    /// Reference time recorded on any timestamps the operation writes.
    pub at: DateTime<Utc>,
}

impl CallerContext {
    pub fn new(actor: Option<NonEmptyText>, at: DateTime<Utc>) -> Self {
        Self { actor, at }
    }

    /// Context for background work with no human actor.
    pub fn system(at: DateTime<Utc>) -> Self {
        Self::new(None, at)
    }
}
