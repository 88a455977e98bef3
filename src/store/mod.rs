//! Persistent progress store.
//!
//! A single JSON document with one top-level key per task namespace (see
//! [`progress`]). Each key carries an in-memory revision that is bumped on
//! every write, which gives callers optimistic concurrency: read a value
//! with its revision, compute, and write back only if nobody else wrote in
//! between ([`ProgressStore::compare_and_set`], [`ProgressStore::update`]).
//!
//! Every write rewrites the whole document atomically (temp file, fsync,
//! rename). Revisions are not persisted; they start at 1 for keys present
//! when the file is opened and 0 for absent keys.

pub mod progress;

pub use progress::{
    AnchorAttention, AnchorAttentions, AppAttention, AppAttentions, Attentions, GalleryTask,
    GalleryTasks, Namespace, NotifiedAnchors, NotifiedApps, RepliedThreads, StartupRecord,
};

use crate::error::{Result, TaskError};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Attempts [`ProgressStore::update`] makes before reporting a conflict.
pub const MAX_UPDATE_ATTEMPTS: u32 = 5;

/// A stored value together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Revision of the key when read; 0 means the key was absent.
    pub revision: u64,
    /// Decoded value.
    pub value: T,
}

#[derive(Debug, Default)]
struct StoreInner {
    document: Map<String, Value>,
    revisions: HashMap<String, u64>,
}

/// Shared handle to the progress store. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct ProgressStore {
    path: Option<PathBuf>,
    inner: Arc<Mutex<StoreInner>>,
}

impl ProgressStore {
    /// Open the store at `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if the file exists but is not a JSON object.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let document = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Value>(&bytes) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    return Err(TaskError::Store(format!(
                        "{} is not a JSON object",
                        path.display()
                    )));
                }
                Err(e) => {
                    return Err(TaskError::Store(format!(
                        "failed to parse {}: {e}",
                        path.display()
                    )));
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };
        let revisions = document.keys().map(|k| (k.clone(), 1)).collect();
        tracing::debug!(path = %path.display(), keys = document.len(), "progress store opened");
        Ok(Self {
            path: Some(path),
            inner: Arc::new(Mutex::new(StoreInner {
                document,
                revisions,
            })),
        })
    }

    /// A store that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            inner: Arc::new(Mutex::new(StoreInner::default())),
        }
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner
            .lock()
            .map_err(|_| TaskError::Store("progress store lock poisoned".into()))
    }

    /// Read a namespace. `None` when the key is absent.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if the stored value does not decode as `T`.
    pub fn get<T: Namespace>(&self) -> Result<Option<Versioned<T>>> {
        let inner = self.lock()?;
        let Some(raw) = inner.document.get(T::KEY) else {
            return Ok(None);
        };
        let value = serde_json::from_value(raw.clone())
            .map_err(|e| TaskError::Store(format!("failed to decode '{}': {e}", T::KEY)))?;
        let revision = inner.revisions.get(T::KEY).copied().unwrap_or(0);
        Ok(Some(Versioned { revision, value }))
    }

    /// Read a namespace, falling back to its default at revision 0.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if the stored value does not decode as `T`.
    pub fn get_or_default<T: Namespace>(&self) -> Result<Versioned<T>> {
        Ok(self.get()?.unwrap_or_else(|| Versioned {
            revision: 0,
            value: T::default(),
        }))
    }

    /// Unconditionally write a namespace. Returns the new revision.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the file cannot be written.
    pub fn set<T: Namespace>(&self, value: &T) -> Result<u64> {
        let encoded = encode(value)?;
        let mut inner = self.lock()?;
        self.write_locked(&mut inner, T::KEY, encoded)
    }

    /// Write a namespace only if its revision still equals `expected`.
    ///
    /// Returns the new revision, or `None` when the key was written by
    /// someone else since `expected` was read.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be encoded or the file cannot be written.
    pub fn compare_and_set<T: Namespace>(&self, expected: u64, value: &T) -> Result<Option<u64>> {
        let encoded = encode(value)?;
        let mut inner = self.lock()?;
        let current = inner.revisions.get(T::KEY).copied().unwrap_or(0);
        if current != expected {
            tracing::debug!(key = T::KEY, expected, current, "stale revision");
            return Ok(None);
        }
        self.write_locked(&mut inner, T::KEY, encoded).map(Some)
    }

    /// Read-modify-write a namespace with optimistic retries.
    ///
    /// `f` may run more than once; it must only mutate the value it is given.
    /// Returns the value that was written.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Conflict`] when the key keeps changing for
    /// [`MAX_UPDATE_ATTEMPTS`] attempts, or any read/write error.
    pub fn update<T, F>(&self, mut f: F) -> Result<T>
    where
        T: Namespace,
        F: FnMut(&mut T),
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Versioned {
                revision,
                mut value,
            } = self.get_or_default::<T>()?;
            f(&mut value);
            if self.compare_and_set(revision, &value)?.is_some() {
                return Ok(value);
            }
            tracing::debug!(key = T::KEY, attempt, "update raced, retrying");
        }
        Err(TaskError::Conflict {
            key: T::KEY.to_owned(),
            attempts: MAX_UPDATE_ATTEMPTS,
        })
    }

    /// Current revision of a namespace; 0 when absent.
    ///
    /// # Errors
    ///
    /// Returns [`TaskError::Store`] if the store lock is poisoned.
    pub fn revision<T: Namespace>(&self) -> Result<u64> {
        Ok(self.lock()?.revisions.get(T::KEY).copied().unwrap_or(0))
    }

    fn write_locked(&self, inner: &mut StoreInner, key: &str, value: Value) -> Result<u64> {
        let previous = inner.document.insert(key.to_owned(), value);
        if let Some(path) = &self.path {
            if let Err(e) = write_atomic(path, &inner.document) {
                // Keep memory consistent with disk.
                match previous {
                    Some(old) => inner.document.insert(key.to_owned(), old),
                    None => inner.document.remove(key),
                };
                tracing::error!(key, path = %path.display(), "failed to persist progress: {e}");
                return Err(e);
            }
        }
        let revision = inner.revisions.entry(key.to_owned()).or_insert(0);
        *revision += 1;
        Ok(*revision)
    }
}

fn encode<T: Namespace>(value: &T) -> Result<Value> {
    serde_json::to_value(value)
        .map_err(|e| TaskError::Store(format!("failed to encode '{}': {e}", T::KEY)))
}

fn write_atomic(path: &Path, document: &Map<String, Value>) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_vec_pretty(document)
        .map_err(|e| TaskError::Store(format!("failed to serialize store: {e}")))?;
    let tmp_path = path.with_extension("json.tmp");
    let mut file = std::fs::File::create(&tmp_path)?;
    file.write_all(&json)?;
    file.sync_all()?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;

    #[test]
    fn absent_key_defaults_at_revision_zero() {
        let store = ProgressStore::in_memory();
        assert!(store.get::<RepliedThreads>().unwrap().is_none());
        let v = store.get_or_default::<RepliedThreads>().unwrap();
        assert_eq!(v.revision, 0);
        assert!(v.value.ids.is_empty());
    }

    #[test]
    fn set_bumps_revision() {
        let store = ProgressStore::in_memory();
        let mut replied = RepliedThreads::default();
        replied.ids.push("1".into());
        assert_eq!(store.set(&replied).unwrap(), 1);
        assert_eq!(store.set(&replied).unwrap(), 2);
        assert_eq!(store.revision::<RepliedThreads>().unwrap(), 2);
    }

    #[test]
    fn compare_and_set_rejects_stale_revision() {
        let store = ProgressStore::in_memory();
        let read = store.get_or_default::<NotifiedAnchors>().unwrap();
        store
            .set(&NotifiedAnchors(vec!["douyu_1".into()]))
            .unwrap();

        let mut stale = read.value;
        stale.0.push("huya_2".into());
        assert_eq!(store.compare_and_set(read.revision, &stale).unwrap(), None);
        let current = store.get::<NotifiedAnchors>().unwrap().unwrap();
        assert_eq!(current.value.0, vec!["douyu_1"]);
    }

    #[test]
    fn update_retries_until_unchanged() {
        let store = ProgressStore::in_memory();
        let other = store.clone();
        let mut raced = false;
        let written = store
            .update::<RepliedThreads, _>(|v| {
                if !raced {
                    raced = true;
                    other
                        .set(&RepliedThreads {
                            ids: vec!["from-other".into()],
                        })
                        .unwrap();
                }
                v.ids.push("mine".into());
            })
            .unwrap();
        assert_eq!(written.ids, vec!["from-other", "mine"]);
    }

    #[test]
    fn update_gives_up_with_conflict() {
        let store = ProgressStore::in_memory();
        let other = store.clone();
        let err = store
            .update::<RepliedThreads, _>(|v| {
                other.set(&RepliedThreads::default()).unwrap();
                v.ids.push("never".into());
            })
            .unwrap_err();
        match err {
            TaskError::Conflict { key, attempts } => {
                assert_eq!(key, "sht");
                assert_eq!(attempts, MAX_UPDATE_ATTEMPTS);
            }
            other => panic!("expected Conflict, got {other:?}"),
        }
    }

    #[test]
    fn persists_and_reopens() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("state.json");
        let store = ProgressStore::open(&path).unwrap();
        store
            .set(&StartupRecord {
                startup: 1_700_000_000_000,
            })
            .unwrap();
        store
            .update::<RepliedThreads, _>(|v| v.ids.push("42".into()))
            .unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let reopened = ProgressStore::open(&path).unwrap();
        let replied = reopened.get::<RepliedThreads>().unwrap().unwrap();
        assert_eq!(replied.revision, 1);
        assert_eq!(replied.value.ids, vec!["42"]);
        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["sw"]["startup"], 1_700_000_000_000_i64);
    }

    #[test]
    fn keeps_unknown_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"videos": {"list": [1, 2]}}"#).unwrap();
        let store = ProgressStore::open(&path).unwrap();
        store.set(&NotifiedApps(vec!["appstore_1".into()])).unwrap();

        let raw: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["videos"]["list"][1], 2);
        assert_eq!(raw["apps_no"][0], "appstore_1");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            ProgressStore::open(&path),
            Err(TaskError::Store(_))
        ));
    }

    #[test]
    fn undecodable_value_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"sht": {"ids": "not-a-list"}}"#).unwrap();
        let store = ProgressStore::open(&path).unwrap();
        assert!(store.get::<RepliedThreads>().is_err());
    }
}
