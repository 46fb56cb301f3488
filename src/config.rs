use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Per-render option set. Mirrors the engine's external-interface table
/// field for field; every default here matches the upstream defaults.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    /// Station codes to drop unconditionally.
    #[serde(default)]
    pub exclude_radar: Vec<String>,
    /// Drop stations whose newest frame is older than the staleness threshold.
    #[serde(default)]
    pub ignore_old_radars: bool,
    /// Stripe the ROI of stale stations that are kept.
    #[serde(default = "default_stripe_on_old_radars")]
    pub stripe_on_old_radars: bool,
    /// Staleness threshold, in minutes.
    #[serde(default = "default_declare_old_after_mins")]
    pub declare_old_after_mins: i64,
    /// Compositor worker pool cap.
    #[serde(default = "default_max_concurrent_threads")]
    pub max_concurrent_threads: usize,
    /// Legacy grid-mode sampling resolution, in pixels.
    #[serde(default = "default_check_radar_dist_every_px")]
    pub check_radar_dist_every_px: u32,
    /// Use the legacy grid-sampling partition instead of the analytic
    /// per-scanline partition. Debugging aid only; not part of the
    /// correctness contract.
    #[serde(default)]
    pub use_grid_partition: bool,
    /// Per-station effective radius override, in kilometers.
    #[serde(default = "default_radar_range_override")]
    pub radar_range_override: HashMap<String, f64>,
    /// Per-station priority tier; higher wins ties within effective range.
    #[serde(default = "default_radar_priority")]
    pub radar_priority: HashMap<String, i32>,
}

/// Effective radius, in kilometers, for a station with no explicit override.
pub const DEFAULT_RANGE_KM: f64 = 150.0;
/// Priority tier for a station with no explicit override. Lower than any
/// named override, so named stations win ties against unlisted ones.
pub const DEFAULT_PRIORITY: i32 = -1;

fn default_stripe_on_old_radars() -> bool {
    true
}

fn default_declare_old_after_mins() -> i64 {
    20
}

fn default_max_concurrent_threads() -> usize {
    7
}

fn default_check_radar_dist_every_px() -> u32 {
    10
}

fn default_radar_range_override() -> HashMap<String, f64> {
    HashMap::from([
        ("PWK".to_string(), 110.0),
        ("CGK".to_string(), 90.0),
        ("JAK".to_string(), 200.0),
    ])
}

fn default_radar_priority() -> HashMap<String, i32> {
    HashMap::from([
        ("PWK".to_string(), 1),
        ("CGK".to_string(), 2),
        ("JAK".to_string(), 0),
    ])
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            exclude_radar: Vec::new(),
            ignore_old_radars: false,
            stripe_on_old_radars: default_stripe_on_old_radars(),
            declare_old_after_mins: default_declare_old_after_mins(),
            max_concurrent_threads: default_max_concurrent_threads(),
            check_radar_dist_every_px: default_check_radar_dist_every_px(),
            use_grid_partition: false,
            radar_range_override: default_radar_range_override(),
            radar_priority: default_radar_priority(),
        }
    }
}

impl RenderConfig {
    /// Effective radius for `code`, in kilometers.
    pub fn range_km(&self, code: &str) -> f64 {
        self.radar_range_override
            .get(code)
            .copied()
            .unwrap_or(DEFAULT_RANGE_KM)
    }

    /// Priority tier for `code`; higher wins ties.
    pub fn priority(&self, code: &str) -> i32 {
        self.radar_priority.get(code).copied().unwrap_or(DEFAULT_PRIORITY)
    }

    pub fn is_excluded(&self, code: &str) -> bool {
        self.exclude_radar.iter().any(|c| c == code)
    }
}

/// Process-level configuration for the CLI binary: logging, default output
/// path, and an optional override of the per-render worker cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default)]
    pub render: RenderConfig,
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_filter: default_log_filter(),
            output: None,
            render: RenderConfig::default(),
        }
    }
}

impl AppConfig {
    fn substitute_env_vars(content: &str) -> String {
        shellexpand::env_with_context_no_errors(content, |var| std::env::var(var).ok()).to_string()
    }

    /// Loads configuration from a TOML file, substituting `${VAR}` /
    /// `${VAR:-default}` references against the process environment first.
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let content = Self::substitute_env_vars(&content);
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Loads from `config_path` if given, else from `radar-mosaic.toml` in
    /// the working directory, else falls back to [`AppConfig::default`].
    pub fn load(config_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = config_path {
            if path.exists() {
                return Self::from_file(&path);
            }
        }

        let default_path = PathBuf::from("radar-mosaic.toml");
        if default_path.exists() {
            return Self::from_file(&default_path);
        }

        Ok(AppConfig::default())
    }
}
