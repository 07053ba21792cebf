//! Snapshot-file storage shared by the ledger repositories.
//!
//! Each repository keeps its whole state in one serialised snapshot file under the data
//! directory. Writes go through [`SnapshotStore::update`], which:
//!
//! - serialises all mutations of a store behind a single lock, so a check followed by a
//!   write is atomic within the process,
//! - applies the mutation to a copy and only commits it after the file was written, so a
//!   failed write never leaves partial state in memory,
//! - compares the on-disk revision with the last revision this store loaded or wrote and
//!   refuses the write with [`LedgerError::Conflict`] when another process got there first.
//!
//! Files are replaced atomically (temporary file then rename).

use crate::error::{LedgerError, LedgerResult};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

/// Serialisation format of a snapshot file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Yaml,
}

#[derive(Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de> + Default"))]
struct Envelope<T> {
    #[serde(default)]
    revision: u64,
    #[serde(default)]
    data: T,
}

#[derive(Debug)]
struct Loaded<T> {
    revision: u64,
    data: T,
}

/// A revisioned, optionally file-backed snapshot of `T`.
#[derive(Debug)]
pub struct SnapshotStore<T> {
    path: Option<PathBuf>,
    format: SnapshotFormat,
    inner: RwLock<Loaded<T>>,
}

impl<T> SnapshotStore<T>
where
    T: Clone + Default + Serialize + DeserializeOwned,
{
    /// Opens the snapshot at `path`. A missing file yields an empty store.
    ///
    /// # Errors
    ///
    /// Returns a read or deserialisation error if the file exists but cannot be parsed.
    pub fn open(path: impl Into<PathBuf>, format: SnapshotFormat) -> LedgerResult<Self> {
        let path = path.into();
        let loaded = read_snapshot::<T>(&path, format)?.unwrap_or(Loaded {
            revision: 0,
            data: T::default(),
        });

        Ok(Self {
            path: Some(path),
            format,
            inner: RwLock::new(loaded),
        })
    }

    /// Creates a store with no backing file.
    pub fn in_memory(data: T) -> Self {
        Self {
            path: None,
            format: SnapshotFormat::Json,
            inner: RwLock::new(Loaded { revision: 0, data }),
        }
    }

    /// Revision last loaded or written by this store.
    pub fn revision(&self) -> LedgerResult<u64> {
        let guard = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(guard.revision)
    }

    /// Runs `f` against the current state.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> LedgerResult<R> {
        let guard = self.inner.read().map_err(|_| LedgerError::LockPoisoned)?;
        Ok(f(&guard.data))
    }

    /// Applies `f` to a copy of the state, persists the copy, then commits it.
    ///
    /// If `f` returns an error nothing is written and the state is unchanged.
    ///
    /// # Errors
    ///
    /// - Any error returned by `f`.
    /// - [`LedgerError::Conflict`] if the file was modified by another writer.
    /// - Serialisation or I/O errors while writing the snapshot.
    pub fn update<R>(&self, f: impl FnOnce(&mut T) -> LedgerResult<R>) -> LedgerResult<R> {
        let mut guard = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;

        let mut draft = guard.data.clone();
        let result = f(&mut draft)?;
        let next_revision = guard.revision + 1;

        if let Some(path) = &self.path {
            let on_disk = read_revision(path, self.format)?;
            if on_disk != guard.revision {
                tracing::warn!(
                    path = %path.display(),
                    expected = guard.revision,
                    found = on_disk,
                    "snapshot changed on disk since it was loaded"
                );
                return Err(LedgerError::Conflict(format!(
                    "{} was modified by another writer (expected revision {}, found {})",
                    path.display(),
                    guard.revision,
                    on_disk
                )));
            }
            write_snapshot(path, self.format, next_revision, &draft)?;
        }

        guard.revision = next_revision;
        guard.data = draft;
        Ok(result)
    }

    /// Replaces the in-memory state with the current file contents.
    ///
    /// Used by stores whose file is maintained by an external collaborator. A no-op for
    /// in-memory stores.
    pub fn reload(&self) -> LedgerResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let loaded = read_snapshot::<T>(path, self.format)?.unwrap_or(Loaded {
            revision: 0,
            data: T::default(),
        });
        let mut guard = self.inner.write().map_err(|_| LedgerError::LockPoisoned)?;
        *guard = loaded;
        Ok(())
    }
}

fn read_snapshot<T: DeserializeOwned + Default>(
    path: &Path,
    format: SnapshotFormat,
) -> LedgerResult<Option<Loaded<T>>> {
    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(LedgerError::FileRead(e)),
    };

    let envelope: Envelope<T> = match format {
        SnapshotFormat::Json => {
            serde_json::from_str(&contents).map_err(LedgerError::Deserialization)?
        }
        SnapshotFormat::Yaml => {
            serde_yaml::from_str(&contents).map_err(LedgerError::YamlDeserialization)?
        }
    };

    Ok(Some(Loaded {
        revision: envelope.revision,
        data: envelope.data,
    }))
}

fn read_revision(path: &Path, format: SnapshotFormat) -> LedgerResult<u64> {
    #[derive(Deserialize)]
    struct RevisionOnly {
        #[serde(default)]
        revision: u64,
    }

    let contents = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(LedgerError::FileRead(e)),
    };

    let parsed: RevisionOnly = match format {
        SnapshotFormat::Json => {
            serde_json::from_str(&contents).map_err(LedgerError::Deserialization)?
        }
        SnapshotFormat::Yaml => {
            serde_yaml::from_str(&contents).map_err(LedgerError::YamlDeserialization)?
        }
    };
    Ok(parsed.revision)
}

fn write_snapshot<T: Serialize>(
    path: &Path,
    format: SnapshotFormat,
    revision: u64,
    data: &T,
) -> LedgerResult<()> {
    #[derive(Serialize)]
    struct EnvelopeRef<'a, T> {
        revision: u64,
        data: &'a T,
    }

    let envelope = EnvelopeRef { revision, data };
    let contents = match format {
        SnapshotFormat::Json => {
            serde_json::to_string_pretty(&envelope).map_err(LedgerError::Serialization)?
        }
        SnapshotFormat::Yaml => {
            serde_yaml::to_string(&envelope).map_err(LedgerError::YamlSerialization)?
        }
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(LedgerError::StorageDirCreation)?;
        }
    }

    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, contents).map_err(LedgerError::FileWrite)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(LedgerError::FileWrite(e));
    }
    Ok(())
}
