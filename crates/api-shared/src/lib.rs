//! # API Shared
//!
//! Wire types shared by the ledger's outer surfaces.
//!
//! Contains:
//! - Request and response DTOs with OpenAPI schemas (`dto` module)
//! - Conversions from core domain types into response DTOs
//! - Shared services like `HealthService`
//!
//! Identifiers and dates travel as strings: ids in canonical 32-character hex form, dates as
//! `YYYY-MM-DD`, timestamps as RFC 3339.

pub mod dto;
pub mod health;

pub use dto::*;
pub use health::HealthService;
