use ledger_ids::{AttendanceId, IdError};
use ledger_types::TextError;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },
    #[error("attendance record {0} is locked and cannot be modified")]
    Locked(AttendanceId),
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("conflicting write: {0}")]
    Conflict(String),

    #[error("failed to create storage directory: {0}")]
    StorageDirCreation(std::io::Error),
    #[error("failed to read snapshot file: {0}")]
    FileRead(std::io::Error),
    #[error("failed to write snapshot file: {0}")]
    FileWrite(std::io::Error),
    #[error("failed to serialize snapshot: {0}")]
    Serialization(serde_json::Error),
    #[error("failed to deserialize snapshot: {0}")]
    Deserialization(serde_json::Error),
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("failed to deserialize YAML: {0}")]
    YamlDeserialization(serde_yaml::Error),
    #[error("store lock poisoned")]
    LockPoisoned,
}

impl LedgerError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        LedgerError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<IdError> for LedgerError {
    fn from(err: IdError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

impl From<TextError> for LedgerError {
    fn from(err: TextError) -> Self {
        LedgerError::Validation(err.to_string())
    }
}

pub type LedgerResult<T> = std::result::Result<T, LedgerError>;
