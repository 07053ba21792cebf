//! Storage-backed services and collaborator adapters.
//!
//! The attendance ledger and absence justifier share one snapshot; patients, groups and goals
//! each have their own file maintained by the owning collaborator.

pub mod absence;
pub mod attendance;
pub mod goals;
pub mod groups;
pub mod patients;
pub mod shared;
