//! Station catalog: discovers which radar stations cover a region and
//! fetches each candidate's detailed metadata (bounds, latest frames,
//! palette).

use std::sync::{Arc, Mutex};
use std::thread;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde_json::Value;

use crate::config::RenderConfig;
use crate::error::{RadarError, Result};
use crate::geo::{is_overlapping, parse_hex_color, Region, Rgb};
use crate::http;

pub const RADAR_LIST_URL: &str = "https://radar.bmkg.go.id:8090/radarlist";
pub const RADAR_IMAGE_PUBLIC_URL: &str = "https://api-apps.bmkg.go.id/api/radar-image";
pub const RADAR_IMAGE_URL: &str = "https://radar.bmkg.go.id:8090/sidarmaimage";

/// One radar station as listed by the upstream catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct StationSummary {
    pub code: String,
    pub city: String,
    pub station_name: String,
    pub lat: f64,
    pub lon: f64,
    /// Geographic rectangle covered by this station's native image.
    pub bounds: Region,
}

/// One frame in a station's recent history.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub timestamp_utc: String,
    pub image_url: String,
}

/// A station plus the metadata needed to composite its latest frame.
#[derive(Debug, Clone, PartialEq)]
pub struct StationDetail {
    pub summary: StationSummary,
    /// Oldest to newest.
    pub frames: Vec<Frame>,
    /// `palette[i]` is the source-image color for canonical bin `i`.
    pub palette: Vec<Rgb>,
}

impl StationDetail {
    pub fn code(&self) -> &str {
        &self.summary.code
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.frames.last()
    }

    /// `true` when the newest frame is older than `declare_old_after_mins`.
    pub fn is_stale(&self, now: DateTime<Utc>, declare_old_after_mins: i64) -> bool {
        match self.latest().and_then(|f| parse_frame_time(&f.timestamp_utc)) {
            Some(ts) => (now - ts).num_minutes() >= declare_old_after_mins,
            // Unparseable or absent timestamps are treated as stale: there is
            // no evidence the frame is recent.
            None => true,
        }
    }
}

/// Parses `"YYYY-MM-DD HH:MM"` (optionally followed by a timezone token,
/// which upstream always sets to a literal `UTC`) as a UTC timestamp.
fn parse_frame_time(s: &str) -> Option<DateTime<Utc>> {
    let prefix = s.get(0..16)?;
    NaiveDateTime::parse_from_str(prefix, "%Y-%m-%d %H:%M")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Loads the catalog and returns the stations whose bounds overlap `region`,
/// after dropping anything in `config.exclude_radar`.
pub fn list_in_region(region: &Region, config: &RenderConfig) -> Result<Vec<StationSummary>> {
    let body = http::get(RADAR_LIST_URL, &[])?;
    let parsed: Value = serde_json::from_slice(&body)
        .map_err(|e| RadarError::ParseError(format!("radar list: {e}")))?;

    let entries = extract_list_entries(&parsed)?;

    let mut stations = Vec::new();
    for entry in entries {
        let summary = parse_summary(entry)?;
        if config.is_excluded(&summary.code) {
            tracing::debug!(code = %summary.code, "station excluded by config");
            continue;
        }
        if !is_overlapping(&summary.bounds, region) {
            continue;
        }
        stations.push(summary);
    }
    Ok(stations)
}

/// The list endpoint's response shape varies between a bare array and
/// `{"datas": [...]}` across source iterations; both are accepted.
fn extract_list_entries(value: &Value) -> Result<Vec<&Value>> {
    if let Some(array) = value.as_array() {
        return Ok(array.iter().collect());
    }
    if let Some(array) = value.get("datas").and_then(Value::as_array) {
        return Ok(array.iter().collect());
    }
    Err(RadarError::ParseError(
        "radar list: expected a JSON array or {\"datas\": [...]}".to_string(),
    ))
}

fn parse_summary(entry: &Value) -> Result<StationSummary> {
    let field = |key: &str| -> Result<&Value> {
        entry
            .get(key)
            .ok_or_else(|| RadarError::ParseError(format!("radar list: missing field {key}")))
    };
    let as_str = |v: &Value, key: &str| -> Result<String> {
        v.as_str()
            .map(str::to_string)
            .ok_or_else(|| RadarError::ParseError(format!("radar list: field {key} is not a string")))
    };
    let as_f64 = |v: &Value, key: &str| -> Result<f64> {
        // Upstream has, at various times, sent both numeric and
        // string-encoded coordinates; accept either.
        v.as_f64()
            .or_else(|| v.as_str().and_then(|s| s.parse().ok()))
            .ok_or_else(|| RadarError::ParseError(format!("radar list: field {key} is not numeric")))
    };
    let corner = |v: &Value, key: &str| -> Result<(f64, f64)> {
        let arr = v
            .as_array()
            .ok_or_else(|| RadarError::ParseError(format!("radar list: field {key} is not an array")))?;
        if arr.len() != 2 {
            return Err(RadarError::ParseError(format!(
                "radar list: field {key} does not have exactly 2 elements"
            )));
        }
        Ok((as_f64(&arr[0], key)?, as_f64(&arr[1], key)?))
    };

    let code = as_str(field("kode")?, "kode")?;
    let city = as_str(field("Kota")?, "Kota")?;
    let station_name = as_str(field("Stasiun")?, "Stasiun")?;
    let lat = as_f64(field("lat")?, "lat")?;
    let lon = as_f64(field("lon")?, "lon")?;
    let (north, west) = corner(field("overlayTLC")?, "overlayTLC")?;
    let (south, east) = corner(field("overlayBRC")?, "overlayBRC")?;

    Ok(StationSummary {
        code,
        city,
        station_name,
        lat,
        lon,
        bounds: Region::new(north, west, south, east),
    })
}

/// Fetches detailed metadata for `summary`. Returns `Ok(None)` when the
/// upstream reports `Latest.timeUTC == "No Data"` (not an error: just an
/// empty station), and applies the staleness filter when `ignore_old_radars`
/// is set.
pub fn fetch_detail(summary: &StationSummary, config: &RenderConfig) -> Result<Option<StationDetail>> {
    let token = std::env::var("token").ok();
    let url = match &token {
        Some(token) => format!("{RADAR_IMAGE_URL}?radar={}&token={token}", summary.code),
        None => format!("{RADAR_IMAGE_PUBLIC_URL}?radar={}", summary.code),
    };

    let body = http::get(&url, &[])?;
    let parsed: Value = serde_json::from_slice(&body)
        .map_err(|e| RadarError::ParseError(format!("radar detail {}: {e}", summary.code)))?;

    let latest_time = parsed
        .get("Latest")
        .and_then(|v| v.get("timeUTC"))
        .and_then(Value::as_str)
        .unwrap_or("No Data");
    if latest_time == "No Data" {
        return Ok(None);
    }

    let bounds = parse_detail_bounds(&parsed).unwrap_or(summary.bounds);

    let files = parsed
        .get("LastOneHour")
        .and_then(|v| v.get("file"))
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();
    let times = parsed
        .get("LastOneHour")
        .and_then(|v| v.get("timeUTC"))
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(str::to_string).collect::<Vec<_>>())
        .unwrap_or_default();

    let frames: Vec<Frame> = times
        .into_iter()
        .zip(files)
        .map(|(timestamp_utc, image_url)| Frame {
            timestamp_utc,
            image_url,
        })
        .collect();

    if frames.is_empty() {
        return Ok(None);
    }

    let palette = parsed
        .get("legends")
        .and_then(|v| v.get("colors"))
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(Value::as_str).map(parse_hex_color).collect())
        .unwrap_or_default();

    let detail = StationDetail {
        summary: StationSummary {
            bounds,
            ..summary.clone()
        },
        frames,
        palette,
    };

    if config.ignore_old_radars && detail.is_stale(Utc::now(), config.declare_old_after_mins) {
        tracing::debug!(code = %summary.code, "station dropped as stale");
        return Ok(None);
    }

    Ok(Some(detail))
}

/// Upstream nests detail-response bounds as `bounds.overlayTLC`/
/// `bounds.overlayBRC`, each a 2-element `[lat, lon]` pair (sometimes
/// numeric, sometimes string-encoded) — the same shape the list endpoint
/// uses for a station's own summary bounds.
fn parse_detail_bounds(parsed: &Value) -> Option<Region> {
    let as_f64 = |v: &Value| -> Option<f64> { v.as_f64().or_else(|| v.as_str()?.parse().ok()) };
    let corner = |v: &Value| -> Option<(f64, f64)> {
        let arr = v.as_array()?;
        if arr.len() != 2 {
            return None;
        }
        Some((as_f64(&arr[0])?, as_f64(&arr[1])?))
    };

    let bounds = parsed.get("bounds")?;
    let (north, west) = corner(bounds.get("overlayTLC")?)?;
    let (south, east) = corner(bounds.get("overlayBRC")?)?;
    Some(Region::new(north, west, south, east))
}

/// Loads every station overlapping `region`, then fetches detail metadata
/// for each candidate concurrently (one thread per station, per the
/// network pool's metadata phase). Returns details in registry order,
/// skipping stations with no current frame.
pub fn load_region(region: &Region, config: &RenderConfig) -> Result<Vec<StationDetail>> {
    let summaries = list_in_region(region, config)?;
    if summaries.is_empty() {
        return Ok(Vec::new());
    }

    let results: Arc<Mutex<Vec<Option<StationDetail>>>> =
        Arc::new(Mutex::new(vec![None; summaries.len()]));
    let first_error: Arc<Mutex<Option<RadarError>>> = Arc::new(Mutex::new(None));

    thread::scope(|scope| {
        for (index, summary) in summaries.iter().enumerate() {
            let results = Arc::clone(&results);
            let first_error = Arc::clone(&first_error);
            scope.spawn(move || match fetch_detail(summary, config) {
                Ok(detail) => {
                    results.lock().unwrap()[index] = detail;
                }
                Err(e) => {
                    let mut slot = first_error.lock().unwrap();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                }
            });
        }
    });

    if let Some(e) = Arc::try_unwrap(first_error).unwrap().into_inner().unwrap() {
        return Err(e);
    }

    Ok(Arc::try_unwrap(results)
        .unwrap()
        .into_inner()
        .unwrap()
        .into_iter()
        .flatten()
        .collect())
}
