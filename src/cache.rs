use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use log::{debug, info, warn};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::decode;
use crate::error::{ExperienceError, Result};
use crate::models::{CreativeExperienceSettings, ExperienceKind};

/// Prefix for cache keys, so settings can share a store with other data
const KEY_PREFIX: &str = "creative_experience_settings_";

/// Opaque key to bytes storage used to persist settings
///
/// Writing a key replaces any previous value for it in one step.
pub trait CacheStore: Send + Sync {
    /// Bytes stored under `key`, if any
    fn data(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `data` under `key`, replacing any previous value
    fn store(&self, key: &str, data: &[u8]) -> Result<()>;

    /// Remove every entry
    fn remove_all(&self) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> ExperienceError {
    ExperienceError::Other("Memory cache lock poisoned".to_string())
}

impl CacheStore for MemoryStore {
    fn data(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let entries = self.entries.read().map_err(poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        entries.insert(key.to_string(), data.to_vec());
        Ok(())
    }

    fn remove_all(&self) -> Result<()> {
        self.entries.write().map_err(poisoned)?.clear();
        Ok(())
    }
}

/// Subdirectory of the store root that holds the entries
const ENTRIES_DIR: &str = "creative-experience";

/// Extension of entry files
const ENTRY_EXTENSION: &str = "json";

/// One file per key under a directory owned by the store
///
/// Entries live in a `creative-experience` subdirectory of `root`, named by the
/// SHA-256 of the key so any key length maps to a fixed-size file name. Each write
/// goes to a temporary file in the same directory that is then renamed over the
/// old entry.
#[derive(Debug, Clone)]
pub struct DiskStore {
    root: PathBuf,
}

impl DiskStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the entry files
    pub fn entries_dir(&self) -> PathBuf {
        self.root.join(ENTRIES_DIR)
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.entries_dir().join(format!("{}.{}", digest, ENTRY_EXTENSION))
    }
}

/// Whether `path` has the shape of a file produced by `DiskStore::entry_path`
fn is_entry_file(path: &Path) -> bool {
    let has_extension = path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION);
    let hex_stem = path
        .file_stem()
        .and_then(|stem| stem.to_str())
        .is_some_and(|stem| stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()));

    has_extension && hex_stem && path.is_file()
}

impl CacheStore for DiskStore {
    fn data(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match fs::read(self.entry_path(key)) {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ExperienceError::IoError(e)),
        }
    }

    fn store(&self, key: &str, data: &[u8]) -> Result<()> {
        let dir = self.entries_dir();
        fs::create_dir_all(&dir)?;

        let path = self.entry_path(key);
        let mut file = NamedTempFile::new_in(&dir)?;
        file.write_all(data)?;
        file.persist(&path).map_err(|e| ExperienceError::IoError(e.error))?;

        debug!("Wrote cache entry {}", path.display());
        Ok(())
    }

    /// Removes entry files only; anything else in the directory is left alone
    fn remove_all(&self) -> Result<()> {
        let entries = match fs::read_dir(self.entries_dir()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ExperienceError::IoError(e)),
        };

        for entry in entries {
            let path = entry?.path();
            if is_entry_file(&path) {
                fs::remove_file(&path)?;
            }
        }

        Ok(())
    }
}

/// Settings cached per ad unit
///
/// A later write for an ad unit replaces the earlier settings outright.
#[derive(Debug)]
pub struct SettingsCache<S: CacheStore> {
    store: S,
}

impl<S: CacheStore> SettingsCache<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Cache `settings` for `ad_unit_id`, replacing whatever was there
    pub fn cache(&self, settings: &CreativeExperienceSettings, ad_unit_id: &str) -> Result<()> {
        let data = serde_json::to_vec(settings)?;
        self.store.store(&cache_key(ad_unit_id), &data)?;

        info!(
            "Cached creative experience settings for {} (hash: {})",
            ad_unit_id,
            settings.settings_hash().unwrap_or("none")
        );
        Ok(())
    }

    /// Settings cached for `ad_unit_id`
    ///
    /// Unreadable or corrupt entries are logged and reported as absent.
    pub fn cached_settings(&self, ad_unit_id: &str) -> Option<CreativeExperienceSettings> {
        let data = match self.store.data(&cache_key(ad_unit_id)) {
            Ok(Some(data)) => data,
            Ok(None) => {
                debug!("No cached creative experience settings for {}", ad_unit_id);
                return None;
            }
            Err(e) => {
                warn!("Failed to read cached settings for {}: {}", ad_unit_id, e);
                return None;
            }
        };

        // Entries are always written in canonical form, so the default table is irrelevant.
        match decode::decode_slice(&data, ExperienceKind::NonRewarded) {
            Ok(settings) => Some(settings),
            Err(e) => {
                warn!("Discarding corrupt cached settings for {}: {}", ad_unit_id, e);
                None
            }
        }
    }

    /// Hash of the settings cached for `ad_unit_id`, if any
    pub fn cached_hash(&self, ad_unit_id: &str) -> Option<String> {
        self.cached_settings(ad_unit_id)
            .and_then(|settings| settings.settings_hash().map(str::to_owned))
    }

    /// Settings to use for an ad that just arrived
    ///
    /// A fresh `payload` is decoded and cached. Without one, the cached settings are
    /// used, and failing that the defaults for `kind`.
    pub fn resolve(
        &self,
        ad_unit_id: &str,
        payload: Option<&Value>,
        kind: ExperienceKind,
    ) -> CreativeExperienceSettings {
        if let Some(payload) = payload {
            let settings = decode::decode_settings(payload, kind);
            if let Err(e) = self.cache(&settings, ad_unit_id) {
                warn!("Failed to cache settings for {}: {}", ad_unit_id, e);
            }
            return settings;
        }

        self.cached_settings(ad_unit_id).unwrap_or_else(|| {
            debug!("Using default creative experience settings for {}", ad_unit_id);
            CreativeExperienceSettings::defaults(kind)
        })
    }

    /// Drop every cached entry in the underlying store
    pub fn evict_all(&self) -> Result<()> {
        self.store.remove_all()
    }
}

fn cache_key(ad_unit_id: &str) -> String {
    format!("{}{}", KEY_PREFIX, ad_unit_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AdSettings, EndCardDurations};
    use serde_json::json;

    const AD_UNIT_ID: &str = "testAdUnitID";

    fn settings_with_hash(hash: &str) -> CreativeExperienceSettings {
        CreativeExperienceSettings::new(
            Some(hash.to_string()),
            0.0,
            Vec::new(),
            EndCardDurations::default(),
            AdSettings::default(),
            AdSettings::default(),
        )
    }

    #[test]
    fn test_returns_none_when_nothing_cached() {
        let cache = SettingsCache::new(MemoryStore::new());
        assert!(cache.cached_settings(AD_UNIT_ID).is_none());
        assert!(cache.cached_hash(AD_UNIT_ID).is_none());
    }

    #[test]
    fn test_returns_cached_settings() {
        let cache = SettingsCache::new(MemoryStore::new());
        cache.cache(&settings_with_hash("testHash"), AD_UNIT_ID).unwrap();

        let cached = cache.cached_settings(AD_UNIT_ID).unwrap();
        assert_eq!(cached.settings_hash(), Some("testHash"));
        assert_eq!(cached, settings_with_hash("testHash"));
    }

    #[test]
    fn test_settings_overwrite() {
        let cache = SettingsCache::new(MemoryStore::new());

        cache.cache(&settings_with_hash("testHash"), AD_UNIT_ID).unwrap();
        assert_eq!(cache.cached_hash(AD_UNIT_ID).as_deref(), Some("testHash"));

        cache.cache(&settings_with_hash("differentHash"), AD_UNIT_ID).unwrap();
        assert_eq!(cache.cached_hash(AD_UNIT_ID).as_deref(), Some("differentHash"));
    }

    #[test]
    fn test_ad_units_are_independent() {
        let cache = SettingsCache::new(MemoryStore::new());
        cache.cache(&settings_with_hash("a"), "A").unwrap();
        cache.cache(&settings_with_hash("b"), "B").unwrap();

        assert_eq!(cache.cached_hash("A").as_deref(), Some("a"));
        assert_eq!(cache.cached_hash("B").as_deref(), Some("b"));
    }

    #[test]
    fn test_corrupt_entry_reads_as_absent() {
        let store = MemoryStore::new();
        store.store(&cache_key(AD_UNIT_ID), b"not json").unwrap();

        let cache = SettingsCache::new(store);
        assert!(cache.cached_settings(AD_UNIT_ID).is_none());
    }

    #[test]
    fn test_rewarded_settings_survive_cache() {
        let cache = SettingsCache::new(MemoryStore::new());
        let rewarded = CreativeExperienceSettings::defaults(ExperienceKind::Rewarded);
        cache.cache(&rewarded, AD_UNIT_ID).unwrap();

        assert_eq!(cache.cached_settings(AD_UNIT_ID), Some(rewarded));
    }

    #[test]
    fn test_resolve_prefers_payload_then_cache_then_defaults() {
        let cache = SettingsCache::new(MemoryStore::new());

        let defaults = cache.resolve(AD_UNIT_ID, None, ExperienceKind::Rewarded);
        assert_eq!(defaults, CreativeExperienceSettings::defaults(ExperienceKind::Rewarded));

        let payload = json!({ "hash": "v2", "max_ad_time_secs": 45 });
        let fresh = cache.resolve(AD_UNIT_ID, Some(&payload), ExperienceKind::NonRewarded);
        assert_eq!(fresh.settings_hash(), Some("v2"));
        assert_eq!(fresh.max_ad_experience_time(), 45.0);

        let cached = cache.resolve(AD_UNIT_ID, None, ExperienceKind::Rewarded);
        assert_eq!(cached, fresh);
    }

    #[test]
    fn test_evict_all() {
        let cache = SettingsCache::new(MemoryStore::new());
        cache.cache(&settings_with_hash("testHash"), AD_UNIT_ID).unwrap();

        cache.evict_all().unwrap();
        assert!(cache.cached_settings(AD_UNIT_ID).is_none());
    }

    #[test]
    fn test_disk_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path().join("cache"));

        assert!(store.data("missing").unwrap().is_none());

        store.store("key/with spaces", b"first").unwrap();
        store.store("key/with spaces", b"second").unwrap();
        assert_eq!(store.data("key/with spaces").unwrap().as_deref(), Some(&b"second"[..]));

        store.remove_all().unwrap();
        assert!(store.data("key/with spaces").unwrap().is_none());
    }

    #[test]
    fn test_disk_store_remove_all_without_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path().join("never-created"));
        assert!(store.remove_all().is_ok());
    }

    #[test]
    fn test_disk_store_remove_all_keeps_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = DiskStore::new(dir.path());

        std::fs::write(dir.path().join("Cargo.toml"), b"[package]").unwrap();
        std::fs::create_dir_all(store.entries_dir()).unwrap();
        std::fs::write(store.entries_dir().join("notes.json"), b"{}").unwrap();

        store.store("k", b"value").unwrap();
        store.remove_all().unwrap();

        assert!(store.data("k").unwrap().is_none());
        assert!(dir.path().join("Cargo.toml").exists());
        assert!(store.entries_dir().join("notes.json").exists());
    }

    #[test]
    fn test_long_ad_unit_id_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SettingsCache::new(DiskStore::new(dir.path()));
        let ad_unit_id = "a".repeat(1000);

        cache.cache(&settings_with_hash("long"), &ad_unit_id).unwrap();

        assert_eq!(cache.cached_hash(&ad_unit_id).as_deref(), Some("long"));
        assert!(cache.cached_settings(&"a".repeat(999)).is_none());
    }
}
