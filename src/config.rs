//! # Motion Tool Configuration
//!
//! Every field has a default, so an empty file (or no file at all) reproduces
//! the stock circle test against `/tmp/printer`.
//!
//! ## Example: TOML Configuration
//!
//! ```toml
//! [connection]
//! socket_path = "/home/pi/printer_data/comms/klippy.sock"
//! read_mode = "single"
//!
//! [circle]
//! center_x = 100.0
//! center_y = 100.0
//! radius = 40.0
//! points = 72
//!
//! [pacing]
//! strategy = "buffer_query"
//! max_buffered_ms = 400
//! ```
//!
//! See also: `src/pacing.rs` for how each `[pacing]` strategy behaves.

// src/config.rs - Single configuration file
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration for a diagnostic run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub circle: CircleConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub correction: CorrectionConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.receive_timeout_ms == 0 {
            return Err(ConfigError::Invalid("connection.receive_timeout_ms must be > 0".to_string()));
        }
        if self.connection.max_read == 0 {
            return Err(ConfigError::Invalid("connection.max_read must be > 0".to_string()));
        }
        if self.circle.points == 0 {
            return Err(ConfigError::Invalid("circle.points must be > 0".to_string()));
        }
        if !(self.circle.radius.is_finite() && self.circle.radius > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "circle.radius must be > 0, got {}",
                self.circle.radius
            )));
        }
        if self.correction.max_step_mm <= 0.0 {
            return Err(ConfigError::Invalid("correction.max_step_mm must be > 0".to_string()));
        }
        if self.correction.dt_ms == 0 {
            return Err(ConfigError::Invalid("correction.dt_ms must be > 0".to_string()));
        }
        if !(self.correction.deadzone_px.is_finite() && self.correction.deadzone_px >= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "correction.deadzone_px must be >= 0, got {}",
                self.correction.deadzone_px
            )));
        }
        Ok(())
    }
}

/// How replies are pulled off the socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadMode {
    /// One read of at most `max_read` bytes, returned as-is.
    Single,
    /// Next complete terminator-delimited message.
    #[default]
    Framed,
}

/// Firmware socket settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,
    #[serde(default = "default_receive_timeout_ms")]
    pub receive_timeout_ms: u64,
    #[serde(default)]
    pub read_mode: ReadMode,
    #[serde(default = "default_max_read")]
    pub max_read: usize,
}

impl ConnectionConfig {
    pub fn receive_timeout(&self) -> Duration {
        Duration::from_millis(self.receive_timeout_ms)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            socket_path: default_socket_path(),
            receive_timeout_ms: default_receive_timeout_ms(),
            read_mode: ReadMode::default(),
            max_read: default_max_read(),
        }
    }
}

/// Circle test geometry and the commands around it.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CircleConfig {
    #[serde(default = "default_center")]
    pub center_x: f64,
    #[serde(default = "default_center")]
    pub center_y: f64,
    #[serde(default = "default_radius")]
    pub radius: f64,
    #[serde(default = "default_points")]
    pub points: usize,
    #[serde(default = "default_return_feedrate")]
    pub return_feedrate: u32,
    #[serde(default = "default_setup")]
    pub setup: Vec<String>,
}

impl Default for CircleConfig {
    fn default() -> Self {
        Self {
            center_x: default_center(),
            center_y: default_center(),
            radius: default_radius(),
            points: default_points(),
            return_feedrate: default_return_feedrate(),
            setup: default_setup(),
        }
    }
}

/// Which pacer runs after every send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PacingStrategy {
    #[default]
    FixedDelay,
    WaitForAck,
    BufferQuery,
}

/// Pacing settings. Only the fields of the selected strategy are used.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct PacingConfig {
    #[serde(default)]
    pub strategy: PacingStrategy,
    #[serde(default = "default_home_delay_ms")]
    pub home_delay_ms: u64,
    #[serde(default = "default_setup_delay_ms")]
    pub setup_delay_ms: u64,
    #[serde(default = "default_move_delay_ms")]
    pub move_delay_ms: u64,
    #[serde(default = "default_ack_timeout_ms")]
    pub ack_timeout_ms: u64,
    #[serde(default = "default_max_buffered_ms")]
    pub max_buffered_ms: u64,
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            strategy: PacingStrategy::default(),
            home_delay_ms: default_home_delay_ms(),
            setup_delay_ms: default_setup_delay_ms(),
            move_delay_ms: default_move_delay_ms(),
            ack_timeout_ms: default_ack_timeout_ms(),
            max_buffered_ms: default_max_buffered_ms(),
            poll_ms: default_poll_ms(),
            max_wait_ms: default_max_wait_ms(),
        }
    }
}

/// Relative jog correction driven by a pixel error.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorrectionConfig {
    #[serde(default = "default_kp")]
    pub kp: f64,
    #[serde(default)]
    pub ki: f64,
    #[serde(default)]
    pub kd: f64,
    #[serde(default = "default_deadzone_px")]
    pub deadzone_px: f64,
    #[serde(default = "default_max_step_mm")]
    pub max_step_mm: f64,
    #[serde(default = "default_return_feedrate")]
    pub feedrate: u32,
    #[serde(default = "default_dt_ms")]
    pub dt_ms: u64,
}

impl Default for CorrectionConfig {
    fn default() -> Self {
        Self {
            kp: default_kp(),
            ki: 0.0,
            kd: 0.0,
            deadzone_px: default_deadzone_px(),
            max_step_mm: default_max_step_mm(),
            feedrate: default_return_feedrate(),
            dt_ms: default_dt_ms(),
        }
    }
}

// Default value functions
fn default_socket_path() -> PathBuf { PathBuf::from("/tmp/printer") }
fn default_receive_timeout_ms() -> u64 { 2000 }
fn default_max_read() -> usize { 4096 }
fn default_center() -> f64 { 60.0 }
fn default_radius() -> f64 { 25.0 }
fn default_points() -> usize { 30 }
fn default_return_feedrate() -> u32 { 6000 }
fn default_setup() -> Vec<String> {
    vec!["G28".to_string(), "G90".to_string(), "G1 F12000".to_string()]
}
fn default_home_delay_ms() -> u64 { 5000 }
fn default_setup_delay_ms() -> u64 { 100 }
fn default_move_delay_ms() -> u64 { 10 }
fn default_ack_timeout_ms() -> u64 { 10_000 }
fn default_max_buffered_ms() -> u64 { 500 }
fn default_poll_ms() -> u64 { 50 }
fn default_max_wait_ms() -> u64 { 10_000 }
fn default_kp() -> f64 { 0.001 }
fn default_deadzone_px() -> f64 { 5.0 }
fn default_max_step_mm() -> f64 { 5.0 }
fn default_dt_ms() -> u64 { 33 }

/// Load and validate configuration from a TOML file at the given path.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        tracing::error!("Failed to read config file '{}': {}", path, e);
        ConfigError::Io(e)
    })?;
    let config: Config = toml::from_str(&contents).map_err(|e| {
        tracing::error!("Failed to parse config TOML: {}", e);
        ConfigError::Toml(e)
    })?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_values() {
        let config = Config::default();
        assert_eq!(config.connection.socket_path, PathBuf::from("/tmp/printer"));
        assert_eq!(config.connection.receive_timeout(), Duration::from_secs(2));
        assert_eq!(config.connection.max_read, 4096);
        assert_eq!(config.connection.read_mode, ReadMode::Framed);
        assert_eq!(config.circle.center_x, 60.0);
        assert_eq!(config.circle.radius, 25.0);
        assert_eq!(config.circle.points, 30);
        assert_eq!(config.circle.setup, vec!["G28", "G90", "G1 F12000"]);
        assert_eq!(config.pacing.strategy, PacingStrategy::FixedDelay);
        assert_eq!(config.pacing.home_delay_ms, 5000);
        assert_eq!(config.pacing.setup_delay_ms, 100);
        assert_eq!(config.pacing.move_delay_ms, 10);
        assert_eq!(config.correction.kp, 0.001);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_config_success() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("motion.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(
            file,
            "[connection]\nsocket_path = '/run/klippy.sock'\nread_mode = 'single'\n[circle]\npoints = 72"
        )
        .unwrap();
        file.flush().unwrap();
        let config = load_config(file_path.to_str().unwrap()).unwrap();
        assert_eq!(config.connection.socket_path, PathBuf::from("/run/klippy.sock"));
        assert_eq!(config.connection.read_mode, ReadMode::Single);
        assert_eq!(config.circle.points, 72);
        // Defaults for missing fields
        assert_eq!(config.circle.radius, 25.0);
        assert_eq!(config.connection.receive_timeout_ms, 2000);
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("nonexistent_motion.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("bad.toml");
        let mut file = File::create(&file_path).unwrap();
        writeln!(file, "not a valid toml").unwrap();
        file.flush().unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_load_config_rejects_zero_points() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("zero.toml");
        std::fs::write(&file_path, "[circle]\npoints = 0\n").unwrap();
        let result = load_config(file_path.to_str().unwrap());
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_pacing_strategy_parsing() {
        let config: Config = toml::from_str(
            r#"
            [pacing]
            strategy = "buffer_query"
            max_buffered_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.pacing.strategy, PacingStrategy::BufferQuery);
        assert_eq!(config.pacing.max_buffered_ms, 250);
        assert_eq!(config.pacing.poll_ms, 50);
        assert_eq!(config.pacing.max_wait_ms, 10_000);

        let config: Config = toml::from_str("[pacing]\nstrategy = \"wait_for_ack\"\n").unwrap();
        assert_eq!(config.pacing.strategy, PacingStrategy::WaitForAck);
        assert_eq!(config.pacing.ack_timeout_ms, 10_000);
    }

    #[test]
    fn test_pacing_without_strategy_uses_fixed_delay() {
        let config: Config = toml::from_str("[pacing]\nmove_delay_ms = 20\n").unwrap();
        assert_eq!(config.pacing.strategy, PacingStrategy::FixedDelay);
        assert_eq!(config.pacing.move_delay_ms, 20);
        assert_eq!(config.pacing.home_delay_ms, 5000);
    }

    #[test]
    fn test_invalid_correction_rejected() {
        let mut config = Config::default();
        config.correction.dt_ms = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.correction.deadzone_px = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = Config::default();
        config.correction.deadzone_px = 0.0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_radius_rejected() {
        let mut config = Config::default();
        config.circle.radius = -1.0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
