//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into core services, so
//! request handling and the lifecycle monitor never read process-wide environment variables.

use crate::constants::{
    ATTENDANCE_FILENAME, DEFAULT_DATA_DIR, DEFAULT_RECENCY_WINDOW_DAYS, DEFAULT_SCAN_INTERVAL_SECS,
    GOALS_FILENAME, GROUPS_FILENAME, LIFECYCLE_STATE_FILENAME, PATIENTS_FILENAME,
};
use crate::{LedgerError, LedgerResult};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    scan_interval: Duration,
    recency_window_days: u32,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if the scan interval or the recency window is zero.
    pub fn new(
        data_dir: PathBuf,
        scan_interval: Duration,
        recency_window_days: u32,
    ) -> LedgerResult<Self> {
        if scan_interval.is_zero() {
            return Err(LedgerError::Validation(
                "lifecycle scan interval must be greater than zero".into(),
            ));
        }
        if recency_window_days == 0 {
            return Err(LedgerError::Validation(
                "compliance recency window must be at least one day".into(),
            ));
        }

        Ok(Self {
            data_dir,
            scan_interval,
            recency_window_days,
        })
    }

    /// Configuration with default policy values rooted at `data_dir`.
    pub fn with_defaults(data_dir: PathBuf) -> Self {
        Self {
            data_dir,
            scan_interval: Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS),
            recency_window_days: DEFAULT_RECENCY_WINDOW_DAYS,
        }
    }

    /// Resolve configuration from raw environment values, applying defaults for missing ones.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] if a numeric value is malformed or zero.
    pub fn from_env_values(
        data_dir: Option<String>,
        scan_interval_secs: Option<String>,
        recency_window_days: Option<String>,
    ) -> LedgerResult<Self> {
        let data_dir = data_dir
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_DATA_DIR.to_string());

        Self::new(
            PathBuf::from(data_dir),
            scan_interval_from_env_value(scan_interval_secs)?,
            recency_window_from_env_value(recency_window_days)?,
        )
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn scan_interval(&self) -> Duration {
        self.scan_interval
    }

    pub fn recency_window_days(&self) -> u32 {
        self.recency_window_days
    }

    pub fn attendance_file(&self) -> PathBuf {
        self.data_dir.join(ATTENDANCE_FILENAME)
    }

    pub fn patients_file(&self) -> PathBuf {
        self.data_dir.join(PATIENTS_FILENAME)
    }

    pub fn groups_file(&self) -> PathBuf {
        self.data_dir.join(GROUPS_FILENAME)
    }

    pub fn goals_file(&self) -> PathBuf {
        self.data_dir.join(GOALS_FILENAME)
    }

    pub fn lifecycle_state_file(&self) -> PathBuf {
        self.data_dir.join(LIFECYCLE_STATE_FILENAME)
    }
}

/// Parse a positive integer from an optional string value.
///
/// `None` or an empty/whitespace value yields `default`.
///
/// # Errors
///
/// Returns [`LedgerError::Validation`] naming `name` if the value is not a positive integer.
pub fn positive_u64_from_env_value(
    name: &str,
    value: Option<String>,
    default: u64,
) -> LedgerResult<u64> {
    let value = value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    match value {
        None => Ok(default),
        Some(v) => match v.parse::<u64>() {
            Ok(n) if n > 0 => Ok(n),
            _ => Err(LedgerError::Validation(format!(
                "{} must be a positive integer, got '{}'",
                name, v
            ))),
        },
    }
}

/// Parse the compliance recency window (in days) from an optional string value.
pub fn recency_window_from_env_value(value: Option<String>) -> LedgerResult<u32> {
    let days = positive_u64_from_env_value(
        "COMPLIANCE_RECENCY_DAYS",
        value,
        DEFAULT_RECENCY_WINDOW_DAYS as u64,
    )?;
    u32::try_from(days).map_err(|_| {
        LedgerError::Validation(format!("COMPLIANCE_RECENCY_DAYS is too large: {}", days))
    })
}

/// Parse the lifecycle scan interval from an optional string value holding seconds.
pub fn scan_interval_from_env_value(value: Option<String>) -> LedgerResult<Duration> {
    positive_u64_from_env_value(
        "LIFECYCLE_SCAN_INTERVAL_SECS",
        value,
        DEFAULT_SCAN_INTERVAL_SECS,
    )
    .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_or_blank_values_use_defaults() {
        assert_eq!(
            scan_interval_from_env_value(None).unwrap(),
            Duration::from_secs(DEFAULT_SCAN_INTERVAL_SECS)
        );
        assert_eq!(
            recency_window_from_env_value(Some("  ".into())).unwrap(),
            DEFAULT_RECENCY_WINDOW_DAYS
        );
    }

    #[test]
    fn test_rejects_zero_and_garbage() {
        assert!(matches!(
            scan_interval_from_env_value(Some("0".into())),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(
            recency_window_from_env_value(Some("soon".into())),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn test_parses_explicit_values() {
        assert_eq!(
            scan_interval_from_env_value(Some("60".into())).unwrap(),
            Duration::from_secs(60)
        );
        assert_eq!(recency_window_from_env_value(Some("14".into())).unwrap(), 14);
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let result = CoreConfig::new(PathBuf::from("data"), Duration::ZERO, 30);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_env_values_defaults_data_dir() {
        let cfg = CoreConfig::from_env_values(None, Some("120".into()), None).unwrap();
        assert_eq!(cfg.data_dir(), Path::new(DEFAULT_DATA_DIR));
        assert_eq!(cfg.scan_interval(), Duration::from_secs(120));
        assert_eq!(cfg.recency_window_days(), DEFAULT_RECENCY_WINDOW_DAYS);
    }

    #[test]
    fn test_snapshot_paths_live_under_data_dir() {
        let cfg = CoreConfig::with_defaults(PathBuf::from("/srv/ledger"));
        assert_eq!(
            cfg.attendance_file(),
            PathBuf::from("/srv/ledger/attendance.json")
        );
        assert_eq!(
            cfg.lifecycle_state_file(),
            PathBuf::from("/srv/ledger/lifecycle.yaml")
        );
    }
}
