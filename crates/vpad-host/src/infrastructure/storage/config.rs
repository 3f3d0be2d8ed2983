//! TOML-based configuration for the host application.
//!
//! Reads `AppConfig` from the platform-appropriate config file (or the file
//! named with `--config`) and writes it back for `--write-config`:
//! - Windows:  `%APPDATA%\vpad\config.toml`
//! - Linux:    `~/.config/vpad/config.toml`
//! - macOS:    `~/Library/Application Support/vpad/config.toml`
//!
//! Example:
//!
//! ```toml
//! [host]
//! log_level = "debug"
//! sequence_path = "/srv/vpad/warmup.toml"
//! loop_sequence = true
//! frame_interval_ns = 6250000
//!
//! [controller]
//! attach_failure_policy = "rollback"
//! max_controllers = 4
//! body_color = 0x323232
//! ```
//!
//! # Serde default values
//!
//! Every field carries `#[serde(default = "...")]`, so a missing file, a
//! missing section, or a missing key all fall back to the defaults below.
//! Older config files keep working when new fields are added.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use vpad_core::ControllerIdentity;

use crate::application::manage_controllers::{AttachFailurePolicy, ManagerOptions};

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

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

/// Top-level application configuration stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub host: HostConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HostConfig {
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Input sequence to play; nothing is played when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence_path: Option<PathBuf>,
    /// Replay the sequence until shutdown instead of once.
    #[serde(default)]
    pub loop_sequence: bool,
    /// Pause between sequence iterations, in nanoseconds; values below
    /// [`MIN_FRAME_INTERVAL`] are raised to it.
    #[serde(default = "default_frame_interval_ns")]
    pub frame_interval_ns: u64,
}

/// Virtual controller settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ControllerConfig {
    #[serde(default)]
    pub attach_failure_policy: AttachFailurePolicy,
    #[serde(default = "default_max_controllers")]
    pub max_controllers: usize,
    /// Colors used when a sequence attaches a controller without its own.
    #[serde(default = "default_body_color")]
    pub body_color: u32,
    #[serde(default = "default_buttons_color")]
    pub buttons_color: u32,
    #[serde(default = "default_grip_color")]
    pub grip_left_color: u32,
    #[serde(default = "default_grip_color")]
    pub grip_right_color: u32,
}

/// Shortest pause the host loop accepts between iterations.
pub const MIN_FRAME_INTERVAL: Duration = Duration::from_millis(1);

impl HostConfig {
    /// The configured frame interval, raised to [`MIN_FRAME_INTERVAL`].
    pub fn frame_interval(&self) -> Duration {
        Duration::from_nanos(self.frame_interval_ns).max(MIN_FRAME_INTERVAL)
    }
}

impl ControllerConfig {
    pub fn default_identity(&self) -> ControllerIdentity {
        ControllerIdentity::new(
            self.body_color,
            self.buttons_color,
            self.grip_left_color,
            self.grip_right_color,
        )
    }

    pub fn manager_options(&self) -> ManagerOptions {
        ManagerOptions {
            attach_failure: self.attach_failure_policy,
            max_controllers: self.max_controllers,
        }
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_log_level() -> String {
    "info".to_string()
}
fn default_frame_interval_ns() -> u64 {
    6_250_000
}
fn default_max_controllers() -> usize {
    8
}
fn default_body_color() -> u32 {
    0x2D2D2D
}
fn default_buttons_color() -> u32 {
    0xE6E6E6
}
fn default_grip_color() -> u32 {
    0x2D2D2D
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            sequence_path: None,
            loop_sequence: false,
            frame_interval_ns: default_frame_interval_ns(),
        }
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            attach_failure_policy: AttachFailurePolicy::default(),
            max_controllers: default_max_controllers(),
            body_color: default_body_color(),
            buttons_color: default_buttons_color(),
            grip_left_color: default_grip_color(),
            grip_right_color: default_grip_color(),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Determines the platform-appropriate directory for the config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] when the platform config base
/// directory cannot be determined from the environment.
fn config_dir() -> Result<PathBuf, ConfigError> {
    platform_config_dir().ok_or(ConfigError::NoPlatformConfigDir)
}

/// Resolves the full path to the default config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    Ok(config_dir()?.join("config.toml"))
}

/// Picks the config file to use: `explicit` when given, otherwise the
/// platform default from [`config_file_path`].
///
/// # Errors
///
/// See [`config_file_path`].
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => config_file_path(),
    }
}

/// Loads `AppConfig` from `path`, returning defaults if the file is absent.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(AppConfig::default()),
        Err(source) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Resolves the platform config directory including the `vpad` subdirectory.
fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("vpad"))
    }

    #[cfg(target_os = "linux")]
    {
        // XDG_CONFIG_HOME or ~/.config
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("vpad"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("vpad")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn scratch_dir() -> PathBuf {
        std::env::temp_dir().join(format!("vpad_test_{}", Uuid::new_v4()))
    }

    #[test]
    fn test_app_config_defaults() {
        // Arrange / Act
        let cfg = AppConfig::default();

        // Assert
        assert_eq!(cfg.host.log_level, "info");
        assert_eq!(cfg.host.frame_interval_ns, 6_250_000);
        assert!(!cfg.host.loop_sequence);
        assert!(cfg.host.sequence_path.is_none());
        assert_eq!(cfg.controller.max_controllers, 8);
        assert_eq!(
            cfg.controller.attach_failure_policy,
            AttachFailurePolicy::LeaveRegistered
        );
    }

    #[test]
    fn test_deserialize_empty_toml_uses_defaults() {
        let cfg: AppConfig = toml::from_str("").expect("deserialize empty");
        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_deserialize_partial_controller_section_overrides_defaults() {
        // Arrange
        let toml_str = r#"
[controller]
attach_failure_policy = "rollback"
body_color = 0xFF0000
"#;

        // Act
        let cfg: AppConfig = toml::from_str(toml_str).expect("deserialize partial");

        // Assert
        assert_eq!(cfg.controller.attach_failure_policy, AttachFailurePolicy::Rollback);
        assert_eq!(cfg.controller.body_color, 0xFF0000);
        // Unspecified fields keep their defaults
        assert_eq!(cfg.controller.buttons_color, 0xE6E6E6);
        assert_eq!(cfg.host.log_level, "info");
    }

    #[test]
    fn test_unknown_policy_is_a_parse_error() {
        let result: Result<AppConfig, toml::de::Error> =
            toml::from_str("[controller]\nattach_failure_policy = \"retry_forever\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_controller_config_builds_identity_and_options() {
        // Arrange
        let cfg = ControllerConfig {
            attach_failure_policy: AttachFailurePolicy::Rollback,
            max_controllers: 2,
            body_color: 1,
            buttons_color: 2,
            grip_left_color: 3,
            grip_right_color: 4,
        };

        // Act
        let identity = cfg.default_identity();
        let options = cfg.manager_options();

        // Assert
        assert_eq!(identity, ControllerIdentity::new(1, 2, 3, 4));
        assert_eq!(options.attach_failure, AttachFailurePolicy::Rollback);
        assert_eq!(options.max_controllers, 2);
    }

    #[test]
    fn test_frame_interval_uses_configured_value() {
        let cfg = HostConfig::default();
        assert_eq!(cfg.frame_interval(), Duration::from_nanos(6_250_000));
    }

    #[test]
    fn test_zero_frame_interval_is_raised_to_minimum() {
        let cfg = HostConfig {
            frame_interval_ns: 0,
            ..HostConfig::default()
        };
        assert_eq!(cfg.frame_interval(), MIN_FRAME_INTERVAL);
    }

    #[test]
    fn test_resolve_config_path_prefers_explicit_path() {
        let explicit = Path::new("/etc/vpad/custom.toml");

        let path = resolve_config_path(Some(explicit)).expect("explicit path always resolves");

        assert_eq!(path, explicit);
    }

    #[test]
    fn test_resolve_config_path_falls_back_to_platform_default() {
        assert_eq!(
            resolve_config_path(None).ok(),
            config_file_path().ok()
        );
    }

    #[test]
    fn test_none_sequence_path_is_omitted_from_toml() {
        let toml_str = toml::to_string_pretty(&AppConfig::default()).expect("serialize");
        assert!(!toml_str.contains("sequence_path"));
    }

    #[test]
    fn test_load_config_from_missing_file_returns_defaults() {
        let path = scratch_dir().join("config.toml");

        let cfg = load_config_from(&path).expect("missing file is not an error");

        assert_eq!(cfg, AppConfig::default());
    }

    #[test]
    fn test_save_and_load_round_trip_via_temp_dir() {
        // Arrange
        let dir = scratch_dir();
        let path = dir.join("nested").join("config.toml");
        let mut cfg = AppConfig::default();
        cfg.host.log_level = "debug".to_string();
        cfg.host.sequence_path = Some(PathBuf::from("/tmp/seq.toml"));
        cfg.controller.max_controllers = 3;

        // Act
        save_config_to(&path, &cfg).expect("save");
        let loaded = load_config_from(&path).expect("load");

        // Assert
        assert_eq!(loaded, cfg);

        // Cleanup
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_from_malformed_file_is_parse_error() {
        // Arrange
        let dir = scratch_dir();
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "[[[ not valid toml").unwrap();

        // Act
        let result = load_config_from(&path);

        // Assert
        assert!(matches!(result, Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_config_file_path_ends_with_config_toml() {
        if let Ok(path) = config_file_path() {
            assert!(
                path.ends_with("vpad/config.toml") || path.ends_with("vpad\\config.toml"),
                "unexpected config path {path:?}"
            );
        }
        // NoPlatformConfigDir is acceptable in a stripped CI environment.
    }
}
