//! Persisted plugin settings.
//!
//! Settings live in a single JSON file under the platform config dir and are
//! read through an injected [`SettingsStore`] rather than any ambient global.
//! Persistence is debounced and fire-and-forget: mutations request a save and
//! move on, and a quiet period later the latest snapshot hits disk.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::whitelist::lenient_string_seq;

/// Settings file name inside the config dir.
const SETTINGS_FILE: &str = "settings.json";

/// Quiet period before a requested save actually hits disk.
const PERSIST_DEBOUNCE_MS: u64 = 500;

/// Get the config directory using platform-appropriate location.
///
/// - macOS: `~/Library/Application Support/qrhub/`
/// - Linux: `~/.config/qrhub/` (or `$XDG_CONFIG_HOME`)
/// - Windows: `%APPDATA%/qrhub/`
///
/// Falls back to `~/.qrhub/` if the platform dir is unavailable.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("qrhub"))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".qrhub")
        })
}

/// All persisted state for the plugin.
///
/// The whitelist field is deserialized leniently: a corrupt value (anything
/// other than a sequence of strings) resets to empty instead of failing the
/// whole file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PluginSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, deserialize_with = "lenient_string_seq")]
    pub whitelist: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for PluginSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            whitelist: Vec::new(),
        }
    }
}

/// Injected settings persistence seam.
///
/// `load` never fails: missing or corrupt data degrades to `Default`, since
/// an empty whitelist is a safe state (more items hidden, never a crash).
pub trait SettingsStore: Send + Sync {
    fn load(&self) -> PluginSettings;
    fn store(&self, settings: &PluginSettings) -> Result<(), String>;
}

/// File-backed JSON settings store.
pub struct JsonSettingsStore {
    dir: PathBuf,
}

impl JsonSettingsStore {
    /// Store under the platform config dir.
    pub fn new() -> Self {
        Self { dir: config_dir() }
    }

    /// Store under an explicit base dir (tests, embedders with their own
    /// config layout).
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }
}

impl Default for JsonSettingsStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> PluginSettings {
        let path = self.path();
        if !path.exists() {
            return PluginSettings::default();
        }
        let content = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[qrhub] Warning: could not read settings {}: {e}", path.display());
                return PluginSettings::default();
            }
        };
        match serde_json::from_str(&content) {
            Ok(v) => v,
            Err(e) => {
                eprintln!(
                    "[qrhub] Error: corrupt settings {}: {e}. Using defaults.",
                    path.display()
                );
                PluginSettings::default()
            }
        }
    }

    /// Save atomically (temp file + rename) with 0600 permissions on Unix.
    fn store(&self, settings: &PluginSettings) -> Result<(), String> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| format!("Failed to create config directory: {e}"))?;

        let json = serde_json::to_string_pretty(settings)
            .map_err(|e| format!("Failed to serialize settings: {e}"))?;

        let target = self.path();
        let temp = self
            .dir
            .join(format!("{}.tmp.{}", SETTINGS_FILE, std::process::id()));

        std::fs::write(&temp, &json).map_err(|e| format!("Failed to write temp settings: {e}"))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&temp, perms)
                .map_err(|e| format!("Failed to set settings permissions: {e}"))?;
        }

        // Atomic rename: either the old file or the new file exists, never partial
        std::fs::rename(&temp, &target).map_err(|e| {
            let _ = std::fs::remove_file(&temp);
            format!("Failed to commit settings: {e}")
        })?;

        Ok(())
    }
}

/// Debounced, fire-and-forget persistence.
///
/// Snapshots are sent over an unbounded channel; a background task waits for
/// a quiet period and writes only the latest one, so bursts of toggles cost
/// one disk write. Dropping the handle closes the channel; a snapshot still
/// inside the quiet window is flushed before the task exits.
pub struct Persister {
    tx: mpsc::UnboundedSender<PluginSettings>,
}

impl Persister {
    pub fn spawn(store: std::sync::Arc<dyn SettingsStore>) -> Self {
        Self::spawn_with_debounce(store, Duration::from_millis(PERSIST_DEBOUNCE_MS))
    }

    pub fn spawn_with_debounce(
        store: std::sync::Arc<dyn SettingsStore>,
        debounce: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PluginSettings>();

        tokio::spawn(async move {
            while let Some(mut latest) = rx.recv().await {
                // Quiet period: keep absorbing newer snapshots until the
                // timer fires without interruption.
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(debounce) => break,
                        next = rx.recv() => match next {
                            Some(snapshot) => latest = snapshot,
                            // Channel closed: flush what we have and exit.
                            None => {
                                if let Err(e) = store.store(&latest) {
                                    tracing::warn!("settings persist failed: {e}");
                                }
                                return;
                            }
                        },
                    }
                }
                if let Err(e) = store.store(&latest) {
                    tracing::warn!("settings persist failed: {e}");
                }
            }
        });

        Self { tx }
    }

    /// Request a save of this snapshot. Never blocks; failures surface only
    /// in the log.
    pub fn request(&self, snapshot: PluginSettings) {
        let _ = self.tx.send(snapshot);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn missing_file_returns_default() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        let settings = store.load();
        assert!(settings.enabled);
        assert!(settings.whitelist.is_empty());
    }

    #[test]
    fn settings_round_trip() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        let settings = PluginSettings {
            enabled: false,
            whitelist: vec!["QRV2::Greetings".to_string(), "JSR::s1".to_string()],
        };
        store.store(&settings).unwrap();
        assert_eq!(store.load(), settings);
    }

    #[test]
    fn corrupt_file_returns_default() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), "not valid json!!!").unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        assert_eq!(store.load(), PluginSettings::default());
    }

    #[test]
    fn corrupt_whitelist_resets_to_empty_without_losing_other_fields() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(
            dir.path().join(SETTINGS_FILE),
            r#"{"enabled": false, "whitelist": {"not": "a list"}}"#,
        )
        .unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        let settings = store.load();
        assert!(!settings.enabled);
        assert!(settings.whitelist.is_empty());
    }

    #[test]
    fn old_file_without_new_fields_gets_defaults() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path()).unwrap();
        fs::write(dir.path().join(SETTINGS_FILE), r#"{}"#).unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        let settings = store.load();
        assert!(settings.enabled);
        assert!(settings.whitelist.is_empty());
    }

    #[test]
    fn store_is_atomic_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        store.store(&PluginSettings::default()).unwrap();
        store
            .store(&PluginSettings {
                enabled: false,
                whitelist: vec!["QRV2::A".to_string()],
            })
            .unwrap();

        let entries: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec![SETTINGS_FILE.to_string()]);

        let loaded = store.load();
        assert!(!loaded.enabled);
        assert_eq!(loaded.whitelist, vec!["QRV2::A".to_string()]);
    }

    #[cfg(unix)]
    #[test]
    fn store_sets_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = JsonSettingsStore::with_dir(dir.path());
        store.store(&PluginSettings::default()).unwrap();

        let mode = fs::metadata(dir.path().join(SETTINGS_FILE))
            .unwrap()
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(mode, 0o600, "settings file should be owner-only (0600)");
    }

    #[tokio::test(start_paused = true)]
    async fn persister_coalesces_bursts_into_one_write() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(JsonSettingsStore::with_dir(dir.path()));
        let persister =
            Persister::spawn_with_debounce(store.clone(), Duration::from_millis(500));

        for i in 0..5 {
            persister.request(PluginSettings {
                enabled: true,
                whitelist: vec![format!("QRV2::set-{i}")],
            });
        }

        // Let the quiet period elapse (auto-advanced under the paused clock)
        tokio::time::sleep(Duration::from_millis(600)).await;
        tokio::task::yield_now().await;

        // Only the latest snapshot landed
        let loaded = store.load();
        assert_eq!(loaded.whitelist, vec!["QRV2::set-4".to_string()]);
    }
}
