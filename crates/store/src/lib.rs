//! Local persistence for provider API keys.
//!
//! One string value per provider, addressed by a namespaced entry name and
//! kept in a pluggable [`StorageBackend`]. The default backend is a single
//! JSON file under the user's config directory; when no home directory can
//! be resolved the store silently substitutes an in-memory map. That is a
//! deliberate degrade-to-ephemeral policy, not a failure: no operation on
//! this surface ever reports an error.

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use tracing::{debug, warn};

use byokay_common::ProviderId;

mod error;

pub use error::StoreError;

/// Namespace prefix for persisted entries, e.g. `byokay-openai-key`.
///
/// Fixed for the lifetime of stored data: changing it would silently orphan
/// every previously saved key.
const ENTRY_PREFIX: &str = "byokay-";

fn entry_name(provider: ProviderId) -> String {
    format!("{ENTRY_PREFIX}{provider}-key")
}

// ── Backend seam ───────────────────────────────────────────────────────────

/// Flat string key/value storage the [`KeyStore`] persists through.
///
/// Implementations can be swapped without changing the rest of the crate.
/// All operations are infallible by signature; a backend that cannot
/// complete one logs the problem and degrades.
pub trait StorageBackend: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str);
    fn remove(&self, name: &str);
}

// ── Memory backend ─────────────────────────────────────────────────────────

/// Ephemeral backend used when no persistent storage is available, and by
/// tests that want isolation from the filesystem.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl StorageBackend for MemoryBackend {
    fn get(&self, name: &str) -> Option<String> {
        self.lock().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) {
        self.lock().insert(name.to_string(), value.to_string());
    }

    fn remove(&self, name: &str) {
        self.lock().remove(name);
    }
}

// ── File backend ───────────────────────────────────────────────────────────

/// All entries in one JSON object file.
///
/// Reads tolerate a missing file (empty map) and warn once per call on
/// invalid JSON. Writes go through a temp file and an atomic rename so
/// readers never observe partially-written JSON.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
}

impl FileBackend {
    #[must_use]
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn load_entries(&self) -> HashMap<String, String> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(error) => {
                if error.kind() != std::io::ErrorKind::NotFound {
                    warn!(
                        path = %self.path.display(),
                        error = %error,
                        "failed to read key store file"
                    );
                }
                return HashMap::new();
            },
        };

        match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(error) => {
                warn!(
                    path = %self.path.display(),
                    error = %error,
                    "key store file is invalid JSON and will be ignored"
                );
                HashMap::new()
            },
        }
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_string_pretty(entries)?;

        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let temp_path = self.path.with_extension(format!("json.tmp.{nanos}"));
        std::fs::write(&temp_path, &data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600));
        }

        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn persist_or_warn(&self, entries: &HashMap<String, String>) {
        if let Err(error) = self.persist(entries) {
            warn!(
                path = %self.path.display(),
                error = %error,
                "failed to write key store file, entry change is not persisted"
            );
        }
    }
}

impl StorageBackend for FileBackend {
    fn get(&self, name: &str) -> Option<String> {
        self.load_entries().get(name).cloned()
    }

    fn set(&self, name: &str, value: &str) {
        let mut entries = self.load_entries();
        entries.insert(name.to_string(), value.to_string());
        self.persist_or_warn(&entries);
    }

    fn remove(&self, name: &str) {
        let mut entries = self.load_entries();
        if entries.remove(name).is_some() {
            self.persist_or_warn(&entries);
        }
    }
}

// ── Key store ──────────────────────────────────────────────────────────────

/// Per-provider key persistence, namespaced so the backing file or map can
/// be shared with other data without collisions.
#[derive(Clone)]
pub struct KeyStore {
    backend: Arc<dyn StorageBackend>,
}

impl Default for KeyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyStore {
    /// File-backed store at `<config dir>/byokay/keys.json`, falling back to
    /// an in-memory map when no home directory is available.
    #[must_use]
    pub fn new() -> Self {
        match directories::ProjectDirs::from("", "", "byokay") {
            Some(dirs) => Self::at_path(dirs.config_dir().join("keys.json")),
            None => {
                debug!("no home directory available, using in-memory key store");
                Self::in_memory()
            },
        }
    }

    #[must_use]
    pub fn at_path(path: PathBuf) -> Self {
        Self::with_backend(FileBackend::new(path))
    }

    #[must_use]
    pub fn in_memory() -> Self {
        Self::with_backend(MemoryBackend::new())
    }

    #[must_use]
    pub fn with_backend(backend: impl StorageBackend + 'static) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// The stored key for `provider`, if any.
    #[must_use]
    pub fn get(&self, provider: ProviderId) -> Option<String> {
        self.backend.get(&entry_name(provider))
    }

    /// Store `value` for `provider`, overwriting any previous entry.
    pub fn set(&self, provider: ProviderId, value: &str) {
        self.backend.set(&entry_name(provider), value);
    }

    /// Remove the entry for `provider`. No-op when absent.
    pub fn remove(&self, provider: ProviderId) {
        self.backend.remove(&entry_name(provider));
    }

    /// Bulk lookup used by hosts collecting stored keys for API calls.
    #[must_use]
    pub fn get_many(&self, providers: &[ProviderId]) -> HashMap<ProviderId, Option<String>> {
        providers
            .iter()
            .map(|&provider| (provider, self.get(provider)))
            .collect()
    }
}
