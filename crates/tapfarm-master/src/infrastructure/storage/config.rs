//! TOML-based configuration for the controller.
//!
//! Every field carries a serde default so the application works on first
//! run (before a config file exists) and keeps working when an older file
//! is missing newer fields. Example:
//!
//! ```toml
//! [adb]
//! executable = "adb"
//!
//! [touch]
//! port_start = 1601
//! port_end = 1699
//!
//! [screen]
//! lock_by = "width"
//! quality = 80
//!
//! devices = ["emulator-5554"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tapfarm_core::AspectLock;
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Top-level controller configuration stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub adb: AdbConfig,
    #[serde(default)]
    pub touch: TouchConfig,
    #[serde(default)]
    pub screen: ScreenConfig,
    /// Device serials to start at boot.
    #[serde(default)]
    pub devices: Vec<String>,
    /// Directory holding the prebuilt on-device binaries (stf layout).
    #[serde(default = "default_assets_path")]
    pub shared_assets: PathBuf,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// How to reach the adb tool.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdbConfig {
    /// Name or path of the adb executable.
    #[serde(default = "default_adb_executable")]
    pub executable: String,
}

/// minitouch session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TouchConfig {
    /// First host port reserved for touch forwarding.
    #[serde(default = "default_touch_port_start")]
    pub port_start: u16,
    /// Last host port reserved for touch forwarding (inclusive).
    #[serde(default = "default_touch_port_end")]
    pub port_end: u16,
    /// How long to keep probing a starting server before giving up.
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    /// Extra sleep after each published script, on top of its own waits.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Socket receive buffer for command responses; 0 disables reads
    /// (the standard minitouch build never responds).
    #[serde(default)]
    pub recv_buffer: usize,
}

/// minicap session settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScreenConfig {
    /// First host port reserved for screen forwarding.
    #[serde(default = "default_screen_port_start")]
    pub port_start: u16,
    /// Last host port reserved for screen forwarding (inclusive).
    #[serde(default = "default_screen_port_end")]
    pub port_end: u16,
    /// How long to keep probing a starting server before giving up.
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    /// Whether requested sizes are fitted to the real aspect ratio.
    #[serde(default = "default_true")]
    pub lock_scale: bool,
    /// Which dimension the lock keeps verbatim: `"width"` or `"height"`.
    #[serde(default = "default_lock_by")]
    pub lock_by: String,
    /// Default JPEG quality, 0–100.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Port the relay web server listens on.
    #[serde(default = "default_relay_port")]
    pub relay_port: u16,
    /// Program that runs the relay (normally `node`).
    #[serde(default = "default_relay_command")]
    pub relay_command: String,
    /// Relay server script passed to the program.
    #[serde(default = "default_relay_script")]
    pub relay_script: String,
}

impl ScreenConfig {
    /// The aspect lock resolved from `lock_scale`/`lock_by`.
    pub fn aspect_lock(&self) -> AspectLock {
        if !self.lock_scale {
            AspectLock::None
        } else if self.lock_by.eq_ignore_ascii_case("height") {
            AspectLock::Height
        } else {
            AspectLock::Width
        }
    }
}

impl Default for AdbConfig {
    fn default() -> Self {
        Self {
            executable: default_adb_executable(),
        }
    }
}

impl Default for TouchConfig {
    fn default() -> Self {
        Self {
            port_start: default_touch_port_start(),
            port_end: default_touch_port_end(),
            start_timeout_ms: default_start_timeout_ms(),
            settle_delay_ms: default_settle_delay_ms(),
            recv_buffer: 0,
        }
    }
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            port_start: default_screen_port_start(),
            port_end: default_screen_port_end(),
            start_timeout_ms: default_start_timeout_ms(),
            lock_scale: true,
            lock_by: default_lock_by(),
            quality: default_quality(),
            relay_port: default_relay_port(),
            relay_command: default_relay_command(),
            relay_script: default_relay_script(),
        }
    }
}

// ── Serde default helpers ─────────────────────────────────────────────────────

fn default_adb_executable() -> String {
    "adb".to_string()
}

fn default_touch_port_start() -> u16 {
    1601
}

fn default_touch_port_end() -> u16 {
    1699
}

fn default_screen_port_start() -> u16 {
    1701
}

fn default_screen_port_end() -> u16 {
    1799
}

fn default_start_timeout_ms() -> u64 {
    5000
}

fn default_settle_delay_ms() -> u64 {
    50
}

fn default_true() -> bool {
    true
}

fn default_lock_by() -> String {
    "width".to_string()
}

fn default_quality() -> u8 {
    80
}

fn default_relay_port() -> u16 {
    9002
}

fn default_relay_command() -> String {
    "node".to_string()
}

fn default_relay_script() -> String {
    "minicap_node_server.js".to_string()
}

fn default_assets_path() -> PathBuf {
    PathBuf::from("assets")
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Load / save ───────────────────────────────────────────────────────────────

impl AppConfig {
    /// Loads the config from `path`, or returns defaults when the file does
    /// not exist yet.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    /// Writes the config to `path`, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_missing_fields() {
        let cfg: AppConfig = toml::from_str("").expect("empty config parses");
        assert_eq!(cfg.adb.executable, "adb");
        assert_eq!(cfg.touch.port_start, 1601);
        assert_eq!(cfg.touch.port_end, 1699);
        assert_eq!(cfg.screen.port_start, 1701);
        assert_eq!(cfg.screen.quality, 80);
        assert!(cfg.devices.is_empty());
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            devices = ["emulator-5554"]

            [touch]
            port_start = 2001
            port_end = 2010
            "#,
        )
        .expect("partial config parses");
        assert_eq!(cfg.touch.port_start, 2001);
        assert_eq!(cfg.touch.settle_delay_ms, 50);
        assert_eq!(cfg.devices, vec!["emulator-5554".to_string()]);
    }

    #[test]
    fn test_aspect_lock_resolution() {
        let mut cfg = ScreenConfig::default();
        assert_eq!(cfg.aspect_lock(), AspectLock::Width);
        cfg.lock_by = "height".into();
        assert_eq!(cfg.aspect_lock(), AspectLock::Height);
        cfg.lock_scale = false;
        assert_eq!(cfg.aspect_lock(), AspectLock::None);
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.toml");

        let mut cfg = AppConfig::default();
        cfg.devices.push("serial-1".into());
        cfg.touch.settle_delay_ms = 75;
        cfg.save(&path).expect("save");

        let loaded = AppConfig::load(&path).expect("load");
        assert_eq!(loaded, cfg);
    }

    #[test]
    fn test_load_missing_file_yields_defaults() {
        let cfg = AppConfig::load(Path::new("/nonexistent/tapfarm.toml")).expect("load");
        assert_eq!(cfg, AppConfig::default());
    }
}
