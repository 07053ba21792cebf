//! Constants used throughout the ledger core crate.

/// Days after admission at which the first treatment plan review is due.
pub const FIRST_REVIEW_OFFSET_DAYS: u64 = 18;

/// Days between consecutive treatment plan reviews.
pub const REVIEW_INTERVAL_DAYS: u64 = 30;

/// Reviews are never scheduled later than this many days after admission.
pub const REVIEW_HORIZON_DAYS: u64 = 180;

/// Days after discharge at which a patient becomes cancelled.
pub const CANCELLATION_GRACE_DAYS: u64 = 1;

/// A review may only be generated once this many days have passed since admission.
pub const MIN_DAYS_BEFORE_REVIEW: i64 = 10;

/// Minimum attendance percentage over the review period for a review to be generated.
pub const MIN_REVIEW_ATTENDANCE_PERCENT: f64 = 50.0;

/// Number of treatment goals a patient must have before a review can be generated.
pub const REQUIRED_GOALS_FOR_REVIEW: usize = 4;

/// Default recency window for goal assessments, in days.
pub const DEFAULT_RECENCY_WINDOW_DAYS: u32 = 30;

/// Default interval between lifecycle scans, in seconds.
pub const DEFAULT_SCAN_INTERVAL_SECS: u64 = 3600;

/// Default directory for ledger snapshot files when none is configured.
pub const DEFAULT_DATA_DIR: &str = "ledger_data";

/// Snapshot holding attendance records and absence reasons.
pub const ATTENDANCE_FILENAME: &str = "attendance.json";

/// Snapshot holding patient records maintained by intake.
pub const PATIENTS_FILENAME: &str = "patients.json";

/// Snapshot holding group membership lists.
pub const GROUPS_FILENAME: &str = "groups.json";

/// Snapshot holding patient goals and their assessments.
pub const GOALS_FILENAME: &str = "goals.json";

/// Lifecycle monitor state.
pub const LIFECYCLE_STATE_FILENAME: &str = "lifecycle.yaml";
