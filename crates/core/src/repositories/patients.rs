//! File-backed patient directory.
//!
//! `patients.json` is owned by the intake collaborator. This repository reads it and writes
//! back only the cancellation date.

use crate::collaborators::PatientDirectory;
use crate::error::{LedgerError, LedgerResult};
use crate::patient::Patient;
use crate::repositories::shared::{SnapshotFormat, SnapshotStore};
use chrono::NaiveDate;
use ledger_ids::PatientId;
use std::path::PathBuf;

#[derive(Debug)]
pub struct PatientRepository {
    store: SnapshotStore<Vec<Patient>>,
}

impl PatientRepository {
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        Ok(Self {
            store: SnapshotStore::open(path, SnapshotFormat::Json)?,
        })
    }

    pub fn in_memory(patients: Vec<Patient>) -> Self {
        Self {
            store: SnapshotStore::in_memory(patients),
        }
    }
}

impl PatientDirectory for PatientRepository {
    fn refresh(&self) -> LedgerResult<()> {
        self.store.reload()
    }

    fn get(&self, id: &PatientId) -> LedgerResult<Patient> {
        self.store
            .read(|patients| patients.iter().find(|p| p.id == *id).cloned())?
            .ok_or_else(|| LedgerError::not_found("patient", id))
    }

    fn list(&self) -> LedgerResult<Vec<Patient>> {
        self.store.read(|patients| patients.clone())
    }

    fn set_cancellation_date(&self, id: &PatientId, date: NaiveDate) -> LedgerResult<Patient> {
        self.store.update(|patients| {
            let patient = patients
                .iter_mut()
                .find(|p| p.id == *id)
                .ok_or_else(|| LedgerError::not_found("patient", id))?;

            if let Some(existing) = patient.cancellation_date {
                return Err(LedgerError::InvalidState(format!(
                    "patient {} was already cancelled on {}",
                    id, existing
                )));
            }
            let Some(cutoff) = patient.cancellation_cutoff() else {
                return Err(LedgerError::InvalidState(format!(
                    "patient {} has no discharge date",
                    id
                )));
            };
            if date < cutoff {
                return Err(LedgerError::InvalidState(format!(
                    "patient {} cannot be cancelled before {}",
                    id, cutoff
                )));
            }

            patient.cancellation_date = Some(date);
            Ok(patient.clone())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn discharged(discharge: NaiveDate) -> Patient {
        Patient {
            id: PatientId::new(),
            full_name: "Ana Ruiz".into(),
            admission_date: date(2024, 11, 1),
            discharge_date: Some(discharge),
            cancellation_date: None,
        }
    }

    #[test]
    fn test_cancellation_written_once() {
        let patient = discharged(date(2025, 1, 10));
        let repo = PatientRepository::in_memory(vec![patient.clone()]);

        let updated = repo.set_cancellation_date(&patient.id, date(2025, 1, 11)).unwrap();
        assert_eq!(updated.cancellation_date, Some(date(2025, 1, 11)));

        let again = repo.set_cancellation_date(&patient.id, date(2025, 1, 12));
        assert!(matches!(again, Err(LedgerError::InvalidState(_))));
        assert_eq!(
            repo.get(&patient.id).unwrap().cancellation_date,
            Some(date(2025, 1, 11))
        );
    }

    #[test]
    fn test_cancellation_before_cutoff_rejected() {
        let patient = discharged(date(2025, 1, 10));
        let repo = PatientRepository::in_memory(vec![patient.clone()]);

        let result = repo.set_cancellation_date(&patient.id, date(2025, 1, 10));

        assert!(matches!(result, Err(LedgerError::InvalidState(_))));
    }

    #[test]
    fn test_refresh_picks_up_external_changes() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("patients.json");
        std::fs::write(&path, r#"{"revision":1,"data":[]}"#).unwrap();
        let repo = PatientRepository::open(&path).unwrap();
        assert!(repo.list().unwrap().is_empty());

        let patient = discharged(date(2025, 1, 10));
        let body = serde_json::json!({ "revision": 2, "data": [patient] });
        std::fs::write(&path, body.to_string()).unwrap();
        repo.refresh().unwrap();

        assert_eq!(repo.discharged_pending_cancellation().unwrap(), vec![patient]);
    }
}
