//! File-backed group membership lists (`groups.json`, read-only).

use crate::collaborators::GroupDirectory;
use crate::error::{LedgerError, LedgerResult};
use crate::repositories::shared::{SnapshotFormat, SnapshotStore};
use ledger_ids::{GroupId, PatientId};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupMember {
    pub patient_id: PatientId,
    #[serde(default = "active")]
    pub is_active: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupRecord {
    pub id: GroupId,
    #[serde(default)]
    pub name: String,
    #[serde(default = "active")]
    pub is_active: bool,
    #[serde(default)]
    pub members: Vec<GroupMember>,
}

fn active() -> bool {
    true
}

#[derive(Debug)]
pub struct GroupRepository {
    store: SnapshotStore<Vec<GroupRecord>>,
}

impl GroupRepository {
    pub fn open(path: impl Into<PathBuf>) -> LedgerResult<Self> {
        Ok(Self {
            store: SnapshotStore::open(path, SnapshotFormat::Json)?,
        })
    }

    pub fn in_memory(groups: Vec<GroupRecord>) -> Self {
        Self {
            store: SnapshotStore::in_memory(groups),
        }
    }
}

impl GroupDirectory for GroupRepository {
    fn refresh(&self) -> LedgerResult<()> {
        self.store.reload()
    }

    fn active_members(&self, group: &GroupId) -> LedgerResult<Vec<PatientId>> {
        let record = self
            .store
            .read(|groups| groups.iter().find(|g| g.id == *group).cloned())?
            .ok_or_else(|| LedgerError::not_found("group", group))?;

        if !record.is_active {
            return Ok(Vec::new());
        }
        Ok(record
            .members
            .iter()
            .filter(|m| m.is_active)
            .map(|m| m.patient_id)
            .collect())
    }
}
