//! Canonical goal and goal-assessment schema.
//!
//! Goal assessments are owned by the goal-tracking collaborator. Whatever vocabulary that
//! collaborator uses is mapped onto [`ProgressLevel`] at deserialisation time, so the rest of
//! the core only ever sees the five canonical levels.

use crate::error::LedgerError;
use chrono::NaiveDate;
use ledger_ids::{GoalId, PatientId};
use ledger_types::Percentage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classification of progress recorded by a goal assessment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProgressLevel {
    #[serde(rename = "NotStarted", alias = "Not Started", alias = "not_started")]
    NotStarted,
    #[serde(
        rename = "InProgress",
        alias = "In Progress",
        alias = "in_progress",
        alias = "Minimal Progress",
        alias = "Moderate Progress",
        alias = "Significant Progress"
    )]
    InProgress,
    #[serde(rename = "Achieved", alias = "achieved")]
    Achieved,
    #[serde(rename = "Regression", alias = "regression")]
    Regression,
    #[serde(rename = "NoProgress", alias = "No Progress", alias = "no_progress")]
    NoProgress,
}

impl ProgressLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressLevel::NotStarted => "NotStarted",
            ProgressLevel::InProgress => "InProgress",
            ProgressLevel::Achieved => "Achieved",
            ProgressLevel::Regression => "Regression",
            ProgressLevel::NoProgress => "NoProgress",
        }
    }
}

impl fmt::Display for ProgressLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgressLevel {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['_', ' '], "").as_str() {
            "notstarted" => Ok(ProgressLevel::NotStarted),
            "inprogress" | "minimalprogress" | "moderateprogress" | "significantprogress" => {
                Ok(ProgressLevel::InProgress)
            }
            "achieved" => Ok(ProgressLevel::Achieved),
            "regression" => Ok(ProgressLevel::Regression),
            "noprogress" => Ok(ProgressLevel::NoProgress),
            _ => Err(LedgerError::Validation(format!(
                "unknown progress level '{}'",
                s
            ))),
        }
    }
}

/// A treatment-plan goal configured for a patient.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientGoal {
    pub id: GoalId,
    pub patient_id: PatientId,
    pub goal_number: u32,
    #[serde(default)]
    pub goal_text: String,
}

/// One dated assessment of a goal.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoalAssessment {
    pub goal_id: GoalId,
    pub assessment_date: NaiveDate,
    pub progress_level: ProgressLevel,
    pub percentage_complete: Percentage,
    #[serde(default)]
    pub assessed_by: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_levels_map_to_in_progress() {
        for legacy in ["Minimal Progress", "Moderate Progress", "Significant Progress"] {
            let json = format!("\"{}\"", legacy);
            let level: ProgressLevel = serde_json::from_str(&json).unwrap();
            assert_eq!(level, ProgressLevel::InProgress);
            assert_eq!(legacy.parse::<ProgressLevel>().unwrap(), ProgressLevel::InProgress);
        }
    }

    #[test]
    fn test_canonical_level_round_trip_name() {
        let json = serde_json::to_string(&ProgressLevel::NoProgress).unwrap();
        assert_eq!(json, "\"NoProgress\"");
        let back: ProgressLevel = serde_json::from_str("\"No Progress\"").unwrap();
        assert_eq!(back, ProgressLevel::NoProgress);
    }

    #[test]
    fn test_unknown_level_is_rejected() {
        assert!(matches!(
            "Completed".parse::<ProgressLevel>(),
            Err(LedgerError::Validation(_))
        ));
    }
}
