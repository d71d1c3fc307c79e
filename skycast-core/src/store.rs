//! Durable favorites, recent searches and user preferences.
//!
//! Persistence is an enhancement, not a correctness requirement: every
//! operation is best-effort, and storage or serialization failures are
//! logged and swallowed while the caller receives a safe default.

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Mutex,
};

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use directories::ProjectDirs;

use crate::model::{LocationCandidate, PreferencesPatch, StoredLocation, UserPreferences};

const FAVORITES_KEY: &str = "favorites";
const RECENT_SEARCHES_KEY: &str = "recent-searches";
const PREFERENCES_KEY: &str = "preferences";

/// Recent searches kept, newest first.
const RECENT_SEARCHES_CAP: usize = 10;

/// Where the store keeps its three durable JSON values.
pub trait StorageBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>>;
    fn write(&self, key: &str, value: &str) -> Result<()>;
}

/// One JSON document per key under a directory.
#[derive(Debug)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl StorageBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read store file: {}", path.display()))?;
        Ok(Some(contents))
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| {
            format!("Failed to create store directory: {}", self.dir.display())
        })?;
        let path = self.path_for(key);
        fs::write(&path, value)
            .with_context(|| format!("Failed to write store file: {}", path.display()))?;
        Ok(())
    }
}

/// In-memory backend for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl StorageBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().map_err(|_| anyhow!("store mutex poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().map_err(|_| anyhow!("store mutex poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Used when no durable storage is available: reads nothing, writes nowhere.
#[derive(Debug)]
struct DisabledBackend;

impl StorageBackend for DisabledBackend {
    fn read(&self, _key: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn write(&self, _key: &str, _value: &str) -> Result<()> {
        Ok(())
    }
}

/// Favorites, recent searches and preferences over an injected backend.
pub struct Store {
    backend: Box<dyn StorageBackend>,
}

impl Store {
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self { backend }
    }

    /// Store under the platform data directory, or a disabled store when no
    /// such directory resolves on this host.
    pub fn open_default() -> Self {
        match ProjectDirs::from("dev", "skycast", "skycast") {
            Some(dirs) => Self::new(Box::new(FileBackend::new(dirs.data_dir().to_path_buf()))),
            None => {
                tracing::warn!("no platform data directory, running with a disabled store");
                Self::disabled()
            }
        }
    }

    /// A store whose getters return defaults and whose setters are no-ops.
    pub fn disabled() -> Self {
        Self::new(Box::new(DisabledBackend))
    }

    pub fn favorites(&self) -> Vec<StoredLocation> {
        self.load_list(FAVORITES_KEY)
    }

    /// No-op when a favorite with the same exact (lat, lon) already exists.
    pub fn add_favorite(&self, location: LocationCandidate) {
        let mut favorites = self.favorites();
        let exists = favorites
            .iter()
            .any(|fav| fav.lat == location.lat && fav.lon == location.lon);
        if exists {
            return;
        }
        favorites.push(StoredLocation::stamped(location, now_millis()));
        self.save_list(FAVORITES_KEY, &favorites);
    }

    pub fn remove_favorite(&self, lat: f64, lon: f64) {
        let mut favorites = self.favorites();
        favorites.retain(|fav| !(fav.lat == lat && fav.lon == lon));
        self.save_list(FAVORITES_KEY, &favorites);
    }

    pub fn recent_searches(&self) -> Vec<StoredLocation> {
        self.load_list(RECENT_SEARCHES_KEY)
    }

    /// Move the location to the front, dropping any earlier entry with the
    /// same coordinates, and cap the list.
    pub fn add_recent_search(&self, location: LocationCandidate) {
        let mut recent = self.recent_searches();
        recent.retain(|item| !(item.lat == location.lat && item.lon == location.lon));
        recent.insert(0, StoredLocation::stamped(location, now_millis()));
        recent.truncate(RECENT_SEARCHES_CAP);
        self.save_list(RECENT_SEARCHES_KEY, &recent);
    }

    pub fn preferences(&self) -> UserPreferences {
        match self.backend.read(PREFERENCES_KEY) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!("dropping unreadable preferences: {err}");
                UserPreferences::default()
            }),
            Ok(None) => UserPreferences::default(),
            Err(err) => {
                tracing::warn!("failed to load preferences: {err}");
                UserPreferences::default()
            }
        }
    }

    /// Shallow-merge the patch into the stored preferences and persist the
    /// result. Returns the merged value.
    pub fn update_preferences(&self, patch: PreferencesPatch) -> UserPreferences {
        let mut prefs = self.preferences();
        prefs.apply(patch);
        match serde_json::to_string(&prefs) {
            Ok(raw) => {
                if let Err(err) = self.backend.write(PREFERENCES_KEY, &raw) {
                    tracing::warn!("failed to persist preferences: {err}");
                }
            }
            Err(err) => tracing::warn!("failed to serialize preferences: {err}"),
        }
        prefs
    }

    fn load_list(&self, key: &str) -> Vec<StoredLocation> {
        match self.backend.read(key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|err| {
                tracing::warn!(key, "dropping unreadable stored list: {err}");
                Vec::new()
            }),
            Ok(None) => Vec::new(),
            Err(err) => {
                tracing::warn!(key, "failed to load stored list: {err}");
                Vec::new()
            }
        }
    }

    fn save_list(&self, key: &str, list: &[StoredLocation]) {
        match serde_json::to_string(list) {
            Ok(raw) => {
                if let Err(err) = self.backend.write(key, &raw) {
                    tracing::warn!(key, "failed to persist stored list: {err}");
                }
            }
            Err(err) => tracing::warn!(key, "failed to serialize stored list: {err}"),
        }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
