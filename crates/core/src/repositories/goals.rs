//! File-backed goal source (`goals.json`, read-only).
//!
//! The goal-tracking collaborator has used several progress vocabularies over time. Legacy
//! labels are folded into the canonical [`ProgressLevel`] when the file is parsed. Otherwise
//! the history is returned exactly as recorded: the latest assessment always decides the
//! current progress of a goal.

use crate::collaborators::GoalSource;
use crate::error::LedgerResult;
use crate::goals::{GoalAssessment, PatientGoal};
use crate::repositories::shared::{SnapshotFormat, SnapshotStore};
use ledger_ids::{GoalId, PatientId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct GoalBook {
    #[serde(default)]
    pub goals: Vec<PatientGoal>,
    #[serde(default)]
    pub assessments: Vec<GoalAssessment>,
}

#[derive(Debug)]
pub struct GoalRepository {
    store: SnapshotStore<GoalBook>,
}

impl GoalRepository {
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        Ok(Self {
            store: SnapshotStore::open(path, SnapshotFormat::Json)?,
        })
    }

    pub fn in_memory(book: GoalBook) -> Self {
        Self {
            store: SnapshotStore::in_memory(book),
        }
    }
}

impl GoalSource for GoalRepository {
    fn refresh(&self) -> LedgerResult<()> {
        self.store.reload()
    }

    fn goals_for_patient(&self, patient: &PatientId) -> LedgerResult<Vec<PatientGoal>> {
        let mut goals = self.store.read(|book| {
            book.goals
                .iter()
                .filter(|g| g.patient_id == *patient)
                .cloned()
                .collect::<Vec<_>>()
        })?;
        goals.sort_by_key(|g| g.goal_number);
        Ok(goals)
    }

    fn assessments_for_goal(&self, goal: &GoalId) -> LedgerResult<Vec<GoalAssessment>> {
        self.store.read(|book| {
            book.assessments
                .iter()
                .filter(|a| a.goal_id == *goal)
                .cloned()
                .collect()
        })
    }
}
