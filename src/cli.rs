use std::path::PathBuf;

use clap::Parser;

use crate::error::{RadarError, Result};
use crate::geo::Region;

#[derive(Parser, Debug)]
#[command(name = "radar-mosaic")]
#[command(author, version, about = "Radar mosaicking and compositing engine", long_about = None)]
pub struct Cli {
    /// Region as `north,west,south,east` in decimal degrees.
    #[arg(long, value_parser = parse_region)]
    pub region: Region,

    /// Output PNG path. Overrides the config file's `output`, if any.
    #[arg(short, long, value_name = "FILE", env = "RADAR_MOSAIC_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Canvas width in pixels.
    #[arg(long, default_value_t = 1024)]
    pub width: u32,

    /// Canvas height in pixels.
    #[arg(long, default_value_t = 1024)]
    pub height: u32,

    /// Path to a TOML configuration file.
    #[arg(short, long, value_name = "FILE", env = "RADAR_MOSAIC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose (debug) logging.
    #[arg(short, long)]
    pub verbose: bool,

    /// Station codes to exclude, in addition to any set in the config file.
    #[arg(long = "exclude-radar", value_name = "CODE")]
    pub exclude_radar: Vec<String>,

    /// Drop stations whose newest frame is older than the staleness threshold.
    #[arg(long = "ignore-old")]
    pub ignore_old: bool,

    /// Override the compositor worker pool cap.
    #[arg(long = "max-threads")]
    pub max_threads: Option<usize>,
}

fn parse_region(s: &str) -> std::result::Result<Region, String> {
    let parts: Vec<&str> = s.split(',').collect();
    if parts.len() != 4 {
        return Err(format!(
            "expected `north,west,south,east`, got {} comma-separated value(s)",
            parts.len()
        ));
    }
    let mut values = [0.0_f64; 4];
    for (i, part) in parts.iter().enumerate() {
        values[i] = part
            .trim()
            .parse()
            .map_err(|_| format!("invalid coordinate: {part}"))?;
    }
    let region = Region::new(values[0], values[1], values[2], values[3]);
    if !region.has_positive_area() {
        return Err("region must have north > south and west < east".to_string());
    }
    Ok(region)
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Applies CLI overrides on top of a loaded [`crate::config::RenderConfig`].
    pub fn apply_overrides(&self, config: &mut crate::config::RenderConfig) {
        config.exclude_radar.extend(self.exclude_radar.iter().cloned());
        if self.ignore_old {
            config.ignore_old_radars = true;
        }
        if let Some(max_threads) = self.max_threads {
            config.max_concurrent_threads = max_threads;
        }
    }

    pub fn output_path(&self, default: Option<PathBuf>) -> Result<PathBuf> {
        self.output
            .clone()
            .or(default)
            .ok_or_else(|| RadarError::ConfigError("no output path given".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_valid_region() {
        let region = parse_region("1.0,-1.0,-1.0,1.0").unwrap();
        assert_eq!(region, Region::new(1.0, -1.0, -1.0, 1.0));
    }

    #[test]
    fn rejects_wrong_arity() {
        assert!(parse_region("1.0,2.0,3.0").is_err());
    }

    #[test]
    fn rejects_degenerate_region() {
        assert!(parse_region("1.0,1.0,1.0,1.0").is_err());
    }

    #[test]
    fn overrides_apply_to_render_config() {
        let cli = Cli {
            region: Region::new(1.0, -1.0, -1.0, 1.0),
            output: None,
            width: 10,
            height: 10,
            config: None,
            verbose: false,
            exclude_radar: vec!["PWK".to_string()],
            ignore_old: true,
            max_threads: Some(2),
        };
        let mut config = crate::config::RenderConfig::default();
        cli.apply_overrides(&mut config);
        assert!(config.is_excluded("PWK"));
        assert!(config.ignore_old_radars);
        assert_eq!(config.max_concurrent_threads, 2);
    }
}
