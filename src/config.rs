//! Scoring configuration and its hot-reloading store

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::{Error, Result};

/// Every weight and threshold the engine reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub velocity_weight: u32,
    pub success_rate_weight: u32,
    pub complexity_weight: u32,
    pub infrastructure_weight: u32,
    pub conditional_access_weight: u32,

    /// Below this 7-day velocity (devices/day) the trend is Stalled.
    pub flat_velocity_delta_threshold: f64,
    pub accelerating_ratio: f64,
    pub declining_ratio: f64,

    pub excellent_velocity_threshold: f64,
    pub good_velocity_threshold: f64,
    pub stall_day_penalty: f64,

    pub high_success_rate: f64,
    pub low_success_rate: f64,

    pub high_app_count_threshold: u32,
    pub low_app_count_threshold: u32,
    pub esp_blocking_warning_threshold: u32,
    pub esp_blocking_app_penalty: f64,

    pub gateway_bonus: f64,
    pub co_management_bonus: f64,
    pub zero_touch_bonus: f64,
    pub gateway_missing_penalty: f64,

    pub blocking_policy_penalty: f64,

    pub trust_trough_lower: f64,
    pub trust_trough_upper: f64,
    pub trust_trough_days: i64,
    pub critical_stall_days: i64,

    pub min_batch_size: u64,
    pub max_batch_size: u64,
    pub complexity_playbook_threshold: f64,
    pub complexity_recommend_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            velocity_weight: 30,
            success_rate_weight: 25,
            complexity_weight: 20,
            infrastructure_weight: 15,
            conditional_access_weight: 10,
            flat_velocity_delta_threshold: 0.5,
            accelerating_ratio: 1.15,
            declining_ratio: 0.85,
            excellent_velocity_threshold: 50.0,
            good_velocity_threshold: 20.0,
            stall_day_penalty: 2.0,
            high_success_rate: 0.95,
            low_success_rate: 0.70,
            high_app_count_threshold: 50,
            low_app_count_threshold: 15,
            esp_blocking_warning_threshold: 3,
            esp_blocking_app_penalty: 5.0,
            gateway_bonus: 20.0,
            co_management_bonus: 15.0,
            zero_touch_bonus: 15.0,
            gateway_missing_penalty: 10.0,
            blocking_policy_penalty: 30.0,
            trust_trough_lower: 50.0,
            trust_trough_upper: 60.0,
            trust_trough_days: 30,
            critical_stall_days: 60,
            min_batch_size: 10,
            max_batch_size: 100,
            complexity_playbook_threshold: 70.0,
            complexity_recommend_threshold: 60.0,
        }
    }
}

impl ScoringConfig {
    pub fn weight_total(&self) -> u32 {
        [
            self.velocity_weight,
            self.success_rate_weight,
            self.complexity_weight,
            self.infrastructure_weight,
            self.conditional_access_weight,
        ]
        .iter()
        .fold(0u32, |total, weight| total.saturating_add(*weight))
    }

    /// Checks that the five category weights sum to exactly 100.
    pub fn validate_weights(&self) -> Result<()> {
        let total = self.weight_total();
        if total == 100 {
            Ok(())
        } else {
            Err(Error::InvalidWeights { total })
        }
    }

    /// Parses a flat JSON object, keeping the default for every key that is
    /// missing or whose value does not fit its field. Returns the rejected keys.
    pub fn from_json_lenient(text: &str) -> Result<(Self, Vec<String>)> {
        let supplied: Map<String, Value> = serde_json::from_str(text)?;
        let Value::Object(mut merged) = serde_json::to_value(Self::default())? else {
            return Ok((Self::default(), Vec::new()));
        };

        let mut rejected = Vec::new();
        for (key, value) in supplied {
            let Some(previous) = merged.get(&key).cloned() else {
                continue;
            };
            merged.insert(key.clone(), value);
            if serde_json::from_value::<Self>(Value::Object(merged.clone())).is_err() {
                merged.insert(key.clone(), previous);
                rejected.push(key);
            }
        }

        let config = serde_json::from_value(Value::Object(merged))?;
        Ok((config, rejected))
    }

    /// Loads from `path`, recovering locally from every failure.
    pub fn load_or_default(path: &Path) -> Self {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) => {
                warn!("Failed to read scoring config {}: {err}; using defaults", path.display());
                return Self::default();
            }
        };

        match Self::from_json_lenient(&text) {
            Ok((config, rejected)) => {
                for key in rejected {
                    warn!("Ignoring unparsable value for '{key}' in {}", path.display());
                }
                config
            }
            Err(err) => {
                warn!("Malformed scoring config {}: {err}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Writes pretty JSON via a temp file and rename.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let body = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

struct Loaded {
    config: Arc<ScoringConfig>,
    modified: Option<SystemTime>,
}

/// Shared, file-backed [`ScoringConfig`] that reloads when the file changes.
///
/// Readers get an `Arc` snapshot; a reload swaps the pointer and never mutates
/// a snapshot someone else holds.
pub struct ConfigStore {
    path: PathBuf,
    cache: RwLock<Option<Loaded>>,
    reload_guard: Mutex<()>,
    loads: AtomicUsize,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: RwLock::new(None),
            reload_guard: Mutex::new(()),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the active configuration, reloading it first if the backing
    /// file's modification time has moved past the one seen at last load.
    pub fn current(&self) -> Arc<ScoringConfig> {
        let modified = file_modified(&self.path);
        if let Some(config) = self.cached_if_fresh(modified) {
            return config;
        }

        let _guard = self
            .reload_guard
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        // Another caller may have finished the reload while we waited.
        let modified = file_modified(&self.path);
        if let Some(config) = self.cached_if_fresh(modified) {
            return config;
        }

        let loaded = self.load(modified);
        let config = Arc::clone(&loaded.config);
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(loaded);
        config
    }

    /// Serializes `config` to `path`, or to the store's own file when `None`.
    pub fn save(&self, config: &ScoringConfig, path: Option<&Path>) -> Result<()> {
        let target = path.unwrap_or(&self.path);
        config.write_to(target)?;
        info!("Saved scoring config to {}", target.display());
        Ok(())
    }

    /// Drops the cached snapshot so the next `current()` reads the file again.
    pub fn force_reload(&self) {
        *self
            .cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    fn cached_if_fresh(&self, modified: Option<SystemTime>) -> Option<Arc<ScoringConfig>> {
        let cache = self
            .cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        cache
            .as_ref()
            .filter(|loaded| modified <= loaded.modified)
            .map(|loaded| Arc::clone(&loaded.config))
    }

    fn load(&self, modified: Option<SystemTime>) -> Loaded {
        let count = self.loads.fetch_add(1, Ordering::Relaxed) + 1;
        if modified.is_none() && !self.path.exists() {
            let config = ScoringConfig::default();
            match config.write_to(&self.path) {
                Ok(()) => info!("Wrote default scoring config to {}", self.path.display()),
                Err(err) => warn!(
                    "Could not write default scoring config to {}: {err}",
                    self.path.display()
                ),
            }
            return Loaded {
                config: Arc::new(config),
                modified: file_modified(&self.path),
            };
        }

        let config = ScoringConfig::load_or_default(&self.path);
        if let Err(err) = config.validate_weights() {
            warn!("Scoring config {}: {err}", self.path.display());
        }
        info!("Loaded scoring config from {} (load #{count})", self.path.display());
        Loaded {
            config: Arc::new(config),
            modified,
        }
    }
}

fn file_modified(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn bump_mtime(path: &Path, secs: u64) {
        let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs))
            .unwrap();
    }

    #[test]
    fn default_weights_are_valid() {
        let config = ScoringConfig::default();
        assert_eq!(config.weight_total(), 100);
        assert!(config.validate_weights().is_ok());
    }

    #[test]
    fn weight_validation_reports_total() {
        let config = ScoringConfig {
            conditional_access_weight: 9,
            ..ScoringConfig::default()
        };
        let err = config.validate_weights().unwrap_err();
        assert_eq!(
            err.to_string(),
            "Weights must sum to 100, but current total is 99"
        );
    }

    #[test]
    fn lenient_parse_keeps_defaults_for_bad_and_missing_keys() {
        let text = r#"{
            "velocity_weight": 40,
            "success_rate_weight": "lots",
            "critical_stall_days": 90,
            "some_future_key": true
        }"#;
        let (config, rejected) = ScoringConfig::from_json_lenient(text).unwrap();
        assert_eq!(config.velocity_weight, 40);
        assert_eq!(config.success_rate_weight, 25);
        assert_eq!(config.critical_stall_days, 90);
        assert_eq!(config.gateway_bonus, 20.0);
        assert_eq!(rejected, vec!["success_rate_weight".to_string()]);
    }

    #[test]
    fn malformed_file_falls_back_to_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(ScoringConfig::load_or_default(&path), ScoringConfig::default());
    }

    #[test]
    fn missing_file_is_written_with_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("scoring.json");
        let store = ConfigStore::new(&path);

        let config = store.current();
        assert_eq!(*config, ScoringConfig::default());
        assert!(path.exists());

        let on_disk = ScoringConfig::load_or_default(&path);
        assert_eq!(on_disk, ScoringConfig::default());
    }

    #[test]
    fn current_is_stable_without_file_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        let store = ConfigStore::new(&path);

        let first = store.current();
        let second = store.current();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*first, *second);
    }

    #[test]
    fn concurrent_first_reads_load_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        let store = Arc::new(ConfigStore::new(&path));
        let barrier = Arc::new(std::sync::Barrier::new(8));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    store.current()
                })
            })
            .collect();
        let configs: Vec<Arc<ScoringConfig>> =
            handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(configs.iter().all(|c| Arc::ptr_eq(c, &configs[0])));
        assert_eq!(store.loads.load(Ordering::Relaxed), 1);
        assert!(path.exists());
        assert!(!path.with_extension("json.tmp").exists());
        assert_eq!(ScoringConfig::load_or_default(&path), ScoringConfig::default());
    }

    #[test]
    fn newer_file_is_reloaded() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        let store = ConfigStore::new(&path);
        assert_eq!(store.current().critical_stall_days, 60);

        std::fs::write(&path, r#"{"critical_stall_days": 45}"#).unwrap();
        bump_mtime(&path, 5);
        assert_eq!(store.current().critical_stall_days, 45);
    }

    #[test]
    fn save_then_force_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        let store = ConfigStore::new(&path);
        let mut config = (*store.current()).clone();
        config.min_batch_size = 25;

        store.save(&config, None).unwrap();
        store.force_reload();
        assert_eq!(store.current().min_batch_size, 25);
    }

    #[test]
    fn save_to_other_path_leaves_store_untouched() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("scoring.json");
        let export = dir.path().join("export.json");
        let store = ConfigStore::new(&path);
        let before = store.current();

        let config = ScoringConfig {
            max_batch_size: 500,
            ..ScoringConfig::default()
        };
        store.save(&config, Some(export.as_path())).unwrap();

        assert_eq!(ScoringConfig::load_or_default(&export).max_batch_size, 500);
        assert!(Arc::ptr_eq(&before, &store.current()));
    }
}
