//! Configuration – reads/writes `~/.sweepnav/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sweepnav_hal::i2c::{DEFAULT_I2C_ADDRESS, DEFAULT_I2C_DEVICE};
use sweepnav_hal::rplidar::{DEFAULT_LIDAR_BAUD, DEFAULT_LIDAR_DEVICE};
use sweepnav_hal::serial::{DEFAULT_BAUD, DEFAULT_SERIAL_DEVICE};
use sweepnav_hal::sim::scenarios;
use sweepnav_perception::{Thresholds, ZoneLayout};
use sweepnav_runtime::{ControlLoopConfig, DEFAULT_CYCLE_INTERVAL};

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// `[control]` – loop cadence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    /// Pause after every cycle, in milliseconds.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
}

fn default_interval_ms() -> u64 {
    DEFAULT_CYCLE_INTERVAL.as_millis() as u64
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
        }
    }
}

/// Where sweeps come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    Sim,
    Replay,
    Rplidar,
}

impl std::fmt::Display for SensorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SensorKind::Sim => write!(f, "sim"),
            SensorKind::Replay => write!(f, "replay"),
            SensorKind::Rplidar => write!(f, "rplidar"),
        }
    }
}

/// `[sensor]` – sweep source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorConfig {
    #[serde(default)]
    pub kind: SensorKind,

    /// Canned sweep repeated by the `sim` sensor.
    #[serde(default = "default_sim_scenario")]
    pub sim_scenario: String,

    /// JSON-lines recording played by the `replay` sensor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_path: Option<PathBuf>,

    /// Restart the recording after its last sweep.
    #[serde(default)]
    pub replay_loop: bool,

    /// Serial adapter the `rplidar` sensor is attached to.
    #[serde(default = "default_rplidar_device")]
    pub rplidar_device: String,

    #[serde(default = "default_rplidar_baud")]
    pub rplidar_baud: u32,
}

fn default_sim_scenario() -> String {
    "open_field".to_string()
}
fn default_rplidar_device() -> String {
    DEFAULT_LIDAR_DEVICE.to_string()
}
fn default_rplidar_baud() -> u32 {
    DEFAULT_LIDAR_BAUD
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::default(),
            sim_scenario: default_sim_scenario(),
            replay_path: None,
            replay_loop: false,
            rplidar_device: default_rplidar_device(),
            rplidar_baud: default_rplidar_baud(),
        }
    }
}

/// Where command bytes go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Log,
    Serial,
    I2c,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Log => write!(f, "log"),
            TransportKind::Serial => write!(f, "serial"),
            TransportKind::I2c => write!(f, "i2c"),
        }
    }
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "log" => Ok(TransportKind::Log),
            "serial" => Ok(TransportKind::Serial),
            "i2c" => Ok(TransportKind::I2c),
            other => Err(format!("unknown transport '{other}' (expected log, serial or i2c)")),
        }
    }
}

/// `[transport]` – motor-controller link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default)]
    pub kind: TransportKind,

    #[serde(default = "default_serial_device")]
    pub serial_device: String,

    #[serde(default = "default_serial_baud")]
    pub serial_baud: u32,

    #[serde(default = "default_i2c_device")]
    pub i2c_device: String,

    /// 7-bit slave address of the motor controller.
    #[serde(default = "default_i2c_address")]
    pub i2c_address: u16,
}

fn default_serial_device() -> String {
    DEFAULT_SERIAL_DEVICE.to_string()
}
fn default_serial_baud() -> u32 {
    DEFAULT_BAUD
}
fn default_i2c_device() -> String {
    DEFAULT_I2C_DEVICE.to_string()
}
fn default_i2c_address() -> u16 {
    DEFAULT_I2C_ADDRESS
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            kind: TransportKind::default(),
            serial_device: default_serial_device(),
            serial_baud: default_serial_baud(),
            i2c_device: default_i2c_device(),
            i2c_address: default_i2c_address(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

/// Persisted configuration stored in `~/.sweepnav/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub thresholds: Thresholds,

    #[serde(default)]
    pub control: ControlConfig,

    #[serde(default)]
    pub zones: ZoneLayout,

    #[serde(default)]
    pub sensor: SensorConfig,

    #[serde(default)]
    pub transport: TransportConfig,
}

impl Config {
    /// Reject settings the control loop cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        self.thresholds.validate().map_err(|e| e.to_string())?;
        self.zones.validate().map_err(|e| e.to_string())?;
        if self.control.interval_ms == 0 {
            return Err("control.interval_ms must be greater than zero".to_string());
        }
        match self.sensor.kind {
            SensorKind::Sim => {
                if scenarios::by_name(&self.sensor.sim_scenario).is_none() {
                    return Err(format!(
                        "unknown sim scenario '{}' (expected open_field, boxed_in, left_obstacle or front_wall)",
                        self.sensor.sim_scenario
                    ));
                }
            }
            SensorKind::Replay => {
                if self.sensor.replay_path.is_none() {
                    return Err("sensor.replay_path is required when sensor.kind = \"replay\"".to_string());
                }
            }
            SensorKind::Rplidar => {
                if self.sensor.rplidar_device.trim().is_empty() {
                    return Err("sensor.rplidar_device must not be empty".to_string());
                }
                if self.sensor.rplidar_device == self.transport.serial_device
                    && self.transport.kind == TransportKind::Serial
                {
                    return Err(format!(
                        "sensor.rplidar_device and transport.serial_device are both {}",
                        self.sensor.rplidar_device
                    ));
                }
            }
        }
        if self.transport.kind == TransportKind::I2c && self.transport.i2c_address > 0x7f {
            return Err(format!(
                "transport.i2c_address 0x{:x} is not a 7-bit address",
                self.transport.i2c_address
            ));
        }
        Ok(())
    }

    /// Settings handed to the control loop.
    pub fn to_loop_config(&self) -> ControlLoopConfig {
        ControlLoopConfig {
            thresholds: self.thresholds,
            layout: self.zones,
            interval: Duration::from_millis(self.control.interval_ms),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Return the config path: `$SWEEPNAV_CONFIG`, else `~/.sweepnav/config.toml`.
pub fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("SWEEPNAV_CONFIG") {
        return PathBuf::from(p);
    }
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

/// Build the config path relative to the given home directory.
pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".sweepnav").join("config.toml")
}

/// Load the config, falling back to defaults when no file exists, then apply
/// environment overrides.
pub fn load() -> Result<Config, String> {
    let mut cfg = load_from(&config_path())?.unwrap_or_default();
    apply_env_overrides(&mut cfg)?;
    Ok(cfg)
}

/// Load the config from a specific path.  Returns `None` if the file does not
/// exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Apply `SWEEPNAV_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `SWEEPNAV_FRONT_THRESHOLD_MM` | `thresholds.front_mm` |
/// | `SWEEPNAV_SIDE_THRESHOLD_MM` | `thresholds.side_mm` |
/// | `SWEEPNAV_INTERVAL_MS` | `control.interval_ms` |
/// | `SWEEPNAV_TRANSPORT` | `transport.kind` |
/// | `SWEEPNAV_SERIAL_DEVICE` | `transport.serial_device` |
///
/// A value that does not parse is an error rather than silently ignored.
pub fn apply_env_overrides(cfg: &mut Config) -> Result<(), String> {
    if let Some(v) = env_parsed::<f32>("SWEEPNAV_FRONT_THRESHOLD_MM")? {
        cfg.thresholds.front_mm = v;
    }
    if let Some(v) = env_parsed::<f32>("SWEEPNAV_SIDE_THRESHOLD_MM")? {
        cfg.thresholds.side_mm = v;
    }
    if let Some(v) = env_parsed::<u64>("SWEEPNAV_INTERVAL_MS")? {
        cfg.control.interval_ms = v;
    }
    if let Some(v) = env_parsed::<TransportKind>("SWEEPNAV_TRANSPORT")? {
        cfg.transport.kind = v;
    }
    if let Ok(v) = std::env::var("SWEEPNAV_SERIAL_DEVICE") {
        cfg.transport.serial_device = v;
    }
    Ok(())
}

fn env_parsed<T>(name: &str) -> Result<Option<T>, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| format!("{name}={v:?}: {e}")),
        Err(_) => Ok(None),
    }
}

/// Save the config to the default path, creating its directory if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

/// Save the config to a specific path.
pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        // Owner only (rwx------) on Unix.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sweepnav_perception::ZoneBand;

    #[test]
    fn defaults_match_reference_robot() {
        let cfg = Config::default();
        assert_eq!(cfg.thresholds.front_mm, 500.0);
        assert_eq!(cfg.thresholds.side_mm, 400.0);
        assert_eq!(cfg.control.interval_ms, 60);
        assert_eq!(cfg.transport.serial_device, "/dev/ttyUSB1");
        assert_eq!(cfg.transport.serial_baud, 9600);
        assert_eq!(cfg.transport.i2c_device, "/dev/i2c-1");
        assert_eq!(cfg.transport.i2c_address, 0x08);
        assert_eq!(cfg.sensor.kind, SensorKind::Sim);
        assert_eq!(cfg.sensor.rplidar_device, "/dev/ttyUSB0");
        assert_eq!(cfg.sensor.rplidar_baud, 115200);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn roundtrip_default_config() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        let cfg = Config::default();
        save_to(&cfg, &path).expect("save");

        let loaded = load_from(&path).expect("load ok").expect("some");
        assert_eq!(loaded, cfg);
    }

    #[cfg(unix)]
    #[test]
    fn config_file_has_restrictive_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());

        save_to(&Config::default(), &path).expect("save");

        let file_mode = std::fs::metadata(&path).expect("file metadata").permissions().mode() & 0o777;
        assert_eq!(file_mode, 0o600, "config file must have 0o600 permissions");

        let dir_mode = std::fs::metadata(path.parent().unwrap())
            .expect("dir metadata")
            .permissions()
            .mode()
            & 0o777;
        assert_eq!(dir_mode, 0o700, "config directory must have 0o700 permissions");
    }

    #[test]
    fn config_path_points_to_sweepnav_dir() {
        let p = config_path_for_home("/home/testuser");
        assert!(p.to_string_lossy().contains(".sweepnav"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[thresholds]
front_mm = 650.0

[zones.front]
start_deg = 340.0
end_deg = 20.0

[transport]
kind = "serial"
serial_baud = 115200
"#,
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.thresholds.front_mm, 650.0);
        assert_eq!(cfg.thresholds.side_mm, 400.0);
        assert_eq!(cfg.zones.front, ZoneBand::new(340.0, 20.0));
        assert_eq!(cfg.zones.left, ZoneLayout::default().left);
        assert_eq!(cfg.transport.kind, TransportKind::Serial);
        assert_eq!(cfg.transport.serial_baud, 115200);
        assert_eq!(cfg.transport.serial_device, "/dev/ttyUSB1");
        assert_eq!(cfg.control.interval_ms, 60);
    }

    #[test]
    fn rplidar_sensor_section_parses() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[sensor]
kind = "rplidar"
rplidar_device = "/dev/ttyUSB2"
"#,
        )
        .unwrap();

        let cfg = load_from(&path).unwrap().unwrap();
        assert_eq!(cfg.sensor.kind, SensorKind::Rplidar);
        assert_eq!(cfg.sensor.kind.to_string(), "rplidar");
        assert_eq!(cfg.sensor.rplidar_device, "/dev/ttyUSB2");
        assert_eq!(cfg.sensor.rplidar_baud, 115200);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[transport]\nkind = \"carrier-pigeon\"\n").unwrap();
        assert!(load_from(&path).is_err());
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut cfg = Config::default();
        cfg.thresholds.side_mm = 0.0;
        assert!(cfg.validate().unwrap_err().contains("side"));

        let mut cfg = Config::default();
        cfg.control.interval_ms = 0;
        assert!(cfg.validate().unwrap_err().contains("interval_ms"));

        let mut cfg = Config::default();
        cfg.zones.right = ZoneBand::new(260.0, 400.0);
        assert!(cfg.validate().unwrap_err().contains("right"));

        let mut cfg = Config::default();
        cfg.sensor.kind = SensorKind::Replay;
        assert!(cfg.validate().unwrap_err().contains("replay_path"));

        let mut cfg = Config::default();
        cfg.sensor.sim_scenario = "maze".to_string();
        assert!(cfg.validate().unwrap_err().contains("maze"));

        let mut cfg = Config::default();
        cfg.sensor.kind = SensorKind::Rplidar;
        cfg.sensor.rplidar_device = "/dev/ttyUSB1".to_string();
        cfg.transport.kind = TransportKind::Serial;
        assert!(cfg.validate().unwrap_err().contains("/dev/ttyUSB1"));

        let mut cfg = Config::default();
        cfg.transport.kind = TransportKind::I2c;
        cfg.transport.i2c_address = 0x1ff;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn to_loop_config_carries_every_setting() {
        let mut cfg = Config::default();
        cfg.thresholds = Thresholds::new(700.0, 300.0);
        cfg.control.interval_ms = 100;
        let loop_cfg = cfg.to_loop_config();
        assert_eq!(loop_cfg.thresholds, Thresholds::new(700.0, 300.0));
        assert_eq!(loop_cfg.layout, ZoneLayout::default());
        assert_eq!(loop_cfg.interval, Duration::from_millis(100));
    }

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("I2C".parse::<TransportKind>(), Ok(TransportKind::I2c));
        assert_eq!(" serial ".parse::<TransportKind>(), Ok(TransportKind::Serial));
        assert!("can".parse::<TransportKind>().is_err());
    }

    #[test]
    fn apply_env_overrides_changes_thresholds() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SWEEPNAV_FRONT_THRESHOLD_MM", "750") };
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg).expect("override");
        assert_eq!(cfg.thresholds.front_mm, 750.0);
        unsafe { std::env::remove_var("SWEEPNAV_FRONT_THRESHOLD_MM") };
    }

    #[test]
    fn apply_env_overrides_changes_transport() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe {
            std::env::set_var("SWEEPNAV_TRANSPORT", "serial");
            std::env::set_var("SWEEPNAV_SERIAL_DEVICE", "/dev/ttyACM0");
        }
        let mut cfg = Config::default();
        apply_env_overrides(&mut cfg).expect("override");
        assert_eq!(cfg.transport.kind, TransportKind::Serial);
        assert_eq!(cfg.transport.serial_device, "/dev/ttyACM0");
        unsafe {
            std::env::remove_var("SWEEPNAV_TRANSPORT");
            std::env::remove_var("SWEEPNAV_SERIAL_DEVICE");
        }
    }

    #[test]
    fn unparsable_env_value_is_reported() {
        // SAFETY: single-threaded test; no data races on env vars.
        unsafe { std::env::set_var("SWEEPNAV_TEST_BAD_INTERVAL", "soon") };
        let err = env_parsed::<u64>("SWEEPNAV_TEST_BAD_INTERVAL").unwrap_err();
        assert!(err.contains("SWEEPNAV_TEST_BAD_INTERVAL"));
        assert!(env_parsed::<u64>("SWEEPNAV_TEST_UNSET").unwrap().is_none());
        unsafe { std::env::remove_var("SWEEPNAV_TEST_BAD_INTERVAL") };
    }
}
