//! Persistence seams for license state.
//!
//! The engine consumes two stores:
//! - [`OptionStore`]: durable named records (credentials, license content)
//! - [`TransientStore`]: short-lived strings with a TTL (last error message)
//!
//! [`MemoryStore`] backs tests and embedders that manage persistence
//! themselves; [`FileStore`] keeps one JSON file per record.

use crate::error::{LicenseError, LicenseResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;

/// Name of a persisted record, optionally scoped to a site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    name: String,
    site: Option<String>,
}

impl RecordKey {
    /// A global record.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            site: None,
        }
    }

    /// A record scoped to `site`.
    #[must_use]
    pub fn scoped(name: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            site: Some(site.into()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    fn file_stem(&self) -> String {
        match &self.site {
            Some(site) => format!("{}.{}", sanitize(site), sanitize(&self.name)),
            None => sanitize(&self.name),
        }
    }
}

/// Durable key/value records.
pub trait OptionStore: Send + Sync {
    /// Returns the record, or `None` if it was never written.
    fn get(&self, key: &RecordKey) -> LicenseResult<Option<Value>>;

    /// Replaces the record.
    fn set(&self, key: &RecordKey, value: Value) -> LicenseResult<()>;

    /// Removes the record. Removing a missing record is not an error.
    fn delete(&self, key: &RecordKey) -> LicenseResult<()>;
}

/// Short-lived string slots.
pub trait TransientStore: Send + Sync {
    /// Returns the value unless it is missing or stale.
    fn get_transient(&self, key: &str) -> LicenseResult<Option<String>>;

    /// Stores `value` for `ttl`. A zero TTL never expires.
    fn set_transient(&self, key: &str, value: &str, ttl: Duration) -> LicenseResult<()>;

    /// Removes the value.
    fn delete_transient(&self, key: &str) -> LicenseResult<()>;
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<RecordKey, Value>>,
    transients: Mutex<HashMap<String, (String, Option<Instant>)>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> LicenseResult<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|_| LicenseError::Storage("memory store lock poisoned".to_string()))
}

impl OptionStore for MemoryStore {
    fn get(&self, key: &RecordKey) -> LicenseResult<Option<Value>> {
        Ok(lock(&self.records)?.get(key).cloned())
    }

    fn set(&self, key: &RecordKey, value: Value) -> LicenseResult<()> {
        lock(&self.records)?.insert(key.clone(), value);
        Ok(())
    }

    fn delete(&self, key: &RecordKey) -> LicenseResult<()> {
        lock(&self.records)?.remove(key);
        Ok(())
    }
}

impl TransientStore for MemoryStore {
    fn get_transient(&self, key: &str) -> LicenseResult<Option<String>> {
        let mut transients = lock(&self.transients)?;
        match transients.get(key) {
            Some((_, Some(deadline))) if Instant::now() >= *deadline => {
                transients.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    fn set_transient(&self, key: &str, value: &str, ttl: Duration) -> LicenseResult<()> {
        let deadline = (!ttl.is_zero()).then(|| Instant::now() + ttl);
        lock(&self.transients)?.insert(key.to_string(), (value.to_string(), deadline));
        Ok(())
    }

    fn delete_transient(&self, key: &str) -> LicenseResult<()> {
        lock(&self.transients)?.remove(key);
        Ok(())
    }
}

/// Transient value as written to disk.
#[derive(Debug, Serialize, Deserialize)]
struct TransientFile {
    value: String,
    expires_at: Option<DateTime<Utc>>,
}

/// One JSON file per record under a directory.
///
/// Writes go through a temporary file and a rename, so concurrent writers
/// resolve to whichever finished last.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Opens (or creates) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> LicenseResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Per-user data directory, e.g. `~/.local/share/keygate` on Linux.
    #[must_use]
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("keygate"))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.file_stem()))
    }

    fn transient_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("transient-{}.json", sanitize(key)))
    }

    fn read(path: &Path) -> LicenseResult<Option<String>> {
        match fs::read_to_string(path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Each writer gets its own temp file; the last rename wins.
    fn write(&self, path: &Path, raw: &str) -> LicenseResult<()> {
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(raw.as_bytes())?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }

    fn remove(path: &Path) -> LicenseResult<()> {
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == IoErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl OptionStore for FileStore {
    fn get(&self, key: &RecordKey) -> LicenseResult<Option<Value>> {
        Self::read(&self.record_path(key))?
            .map(|raw| serde_json::from_str(&raw).map_err(Into::into))
            .transpose()
    }

    fn set(&self, key: &RecordKey, value: Value) -> LicenseResult<()> {
        self.write(&self.record_path(key), &serde_json::to_string_pretty(&value)?)
    }

    fn delete(&self, key: &RecordKey) -> LicenseResult<()> {
        Self::remove(&self.record_path(key))
    }
}

impl TransientStore for FileStore {
    fn get_transient(&self, key: &str) -> LicenseResult<Option<String>> {
        let path = self.transient_path(key);
        let Some(raw) = Self::read(&path)? else {
            return Ok(None);
        };
        let entry: TransientFile = serde_json::from_str(&raw)?;
        match entry.expires_at {
            Some(deadline) if Utc::now() >= deadline => {
                Self::remove(&path)?;
                Ok(None)
            }
            _ => Ok(Some(entry.value)),
        }
    }

    fn set_transient(&self, key: &str, value: &str, ttl: Duration) -> LicenseResult<()> {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            let ttl = chrono::Duration::from_std(ttl)
                .map_err(|e| LicenseError::Storage(format!("invalid TTL: {e}")))?;
            Some(Utc::now() + ttl)
        };
        let entry = TransientFile {
            value: value.to_string(),
            expires_at,
        };
        self.write(&self.transient_path(key), &serde_json::to_string(&entry)?)
    }

    fn delete_transient(&self, key: &str) -> LicenseResult<()> {
        Self::remove(&self.transient_path(key))
    }
}

/// Keeps file names portable.
fn sanitize(part: &str) -> String {
    part.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
