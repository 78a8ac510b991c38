//! Scanner configuration – reads/writes `~/.topscan/config.toml`.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use topscan_perception::extractor::{SensorFov, Translation};
use topscan_perception::point_ops::Tolerance;
use topscan_perception::topology::MatchPolicy;
use topscan_runtime::SessionConfig;

/// `machine_url` value that selects the in-process simulated machine.
pub const SIM_MACHINE: &str = "sim";

/// How object points find the surface beneath them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchMode {
    #[default]
    Exact,
    Nearest,
}

impl std::fmt::Display for MatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchMode::Exact => write!(f, "exact"),
            MatchMode::Nearest => write!(f, "nearest"),
        }
    }
}

/// Persisted user configuration stored in `~/.topscan/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Controller API root, e.g. `http://localhost:8000/api/v1`, or `sim`.
    #[serde(default = "default_machine_url")]
    pub machine_url: String,

    /// Three-line origin file.
    #[serde(default = "default_calibration_path")]
    pub calibration_path: PathBuf,

    /// Directory receiving `reference.xyz`, `topologyRef.xyz` and `topology.xyz`.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Per-axis equality tolerance; `0` means exact comparison.
    #[serde(default)]
    pub dedup_epsilon: f32,

    #[serde(default)]
    pub match_policy: MatchMode,

    /// Search radius for the `nearest` policy, in millimetres.
    #[serde(default = "default_match_radius")]
    pub match_radius: f32,

    #[serde(default)]
    pub capture_translation: Translation,

    #[serde(default = "default_frame_timeout_ms")]
    pub frame_timeout_ms: u64,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default = "default_fov_horizontal")]
    pub fov_horizontal_rad: f32,

    #[serde(default = "default_fov_vertical")]
    pub fov_vertical_rad: f32,

    /// Resolution of the simulated depth sensor.
    #[serde(default = "default_sim_width")]
    pub sim_width: u32,
    #[serde(default = "default_sim_height")]
    pub sim_height: u32,
}

fn default_machine_url() -> String {
    "http://localhost:8000/api/v1".to_string()
}
fn default_calibration_path() -> PathBuf {
    PathBuf::from("coordinates.txt")
}
fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}
fn default_match_radius() -> f32 {
    1.0
}
fn default_frame_timeout_ms() -> u64 {
    2000
}
fn default_request_timeout_ms() -> u64 {
    5000
}
fn default_fov_horizontal() -> f32 {
    SensorFov::default().horizontal
}
fn default_fov_vertical() -> f32 {
    SensorFov::default().vertical
}
fn default_sim_width() -> u32 {
    64
}
fn default_sim_height() -> u32 {
    48
}

impl Default for Config {
    fn default() -> Self {
        Self {
            machine_url: default_machine_url(),
            calibration_path: default_calibration_path(),
            output_dir: default_output_dir(),
            dedup_epsilon: 0.0,
            match_policy: MatchMode::default(),
            match_radius: default_match_radius(),
            capture_translation: Translation::default(),
            frame_timeout_ms: default_frame_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
            fov_horizontal_rad: default_fov_horizontal(),
            fov_vertical_rad: default_fov_vertical(),
            sim_width: default_sim_width(),
            sim_height: default_sim_height(),
        }
    }
}

impl Config {
    pub fn uses_sim_machine(&self) -> bool {
        self.machine_url.trim().eq_ignore_ascii_case(SIM_MACHINE)
    }

    pub fn tolerance(&self) -> Tolerance {
        Tolerance::new(self.dedup_epsilon)
    }

    pub fn match_policy(&self) -> MatchPolicy {
        match self.match_policy {
            MatchMode::Exact => MatchPolicy::Exact,
            MatchMode::Nearest => MatchPolicy::Nearest {
                radius: self.match_radius,
            },
        }
    }

    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            calibration_path: self.calibration_path.clone(),
            output_dir: self.output_dir.clone(),
            tolerance: self.tolerance(),
            match_policy: self.match_policy(),
            capture_translation: self.capture_translation,
            fov: SensorFov {
                horizontal: self.fov_horizontal_rad,
                vertical: self.fov_vertical_rad,
            },
        }
    }
}

/// Return the path to `~/.topscan/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".topscan").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<Config>, String> {
    load_from(&config_path())
}

pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let mut cfg: Config =
        toml::from_str(&raw).map_err(|e| format!("Failed to parse config: {}", e))?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `TOPSCAN_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `TOPSCAN_MACHINE_URL` | `machine_url` |
/// | `TOPSCAN_CALIBRATION_PATH` | `calibration_path` |
/// | `TOPSCAN_OUTPUT_DIR` | `output_dir` |
/// | `TOPSCAN_DEDUP_EPSILON` | `dedup_epsilon` |
/// | `TOPSCAN_FRAME_TIMEOUT_MS` | `frame_timeout_ms` |
///
/// Unparseable numbers are ignored.
pub fn apply_env_overrides(cfg: &mut Config) {
    if let Ok(v) = std::env::var("TOPSCAN_MACHINE_URL") {
        cfg.machine_url = v;
    }
    if let Ok(v) = std::env::var("TOPSCAN_CALIBRATION_PATH") {
        cfg.calibration_path = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("TOPSCAN_OUTPUT_DIR") {
        cfg.output_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("TOPSCAN_DEDUP_EPSILON")
        && let Ok(eps) = v.trim().parse::<f32>()
        && eps.is_finite()
        && eps >= 0.0
    {
        cfg.dedup_epsilon = eps;
    }
    if let Ok(v) = std::env::var("TOPSCAN_FRAME_TIMEOUT_MS")
        && let Ok(ms) = v.trim().parse::<u64>()
    {
        cfg.frame_timeout_ms = ms;
    }
}

/// Save the config to disk, creating `~/.topscan/` if necessary.
pub fn save(cfg: &Config) -> Result<(), String> {
    save_to(cfg, &config_path())
}

pub(crate) fn save_to(cfg: &Config, path: &Path) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create config directory: {}", e))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| format!("Failed to set config directory permissions: {}", e))?;
        }
    }
    let raw =
        toml::to_string_pretty(cfg).map_err(|e| format!("Failed to serialize config: {}", e))?;
    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| f.write_all(raw.as_bytes()))
            .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw)
        .map_err(|e| format!("Failed to write config at {}: {}", path.display(), e))?;
    Ok(())
}
