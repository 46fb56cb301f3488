//! Pure geometric primitives: tile projection, bounding-box overlap, and
//! palette hex-color parsing. No I/O, no allocation beyond what the caller
//! already owns.

use std::f64::consts::PI;

/// An axis-aligned geographic bounding box in decimal degrees.
///
/// `north > south` and `west < east` are required for the box to have
/// positive area; the antimeridian is not supported (callers must not
/// construct a region that wraps across it).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub north: f64,
    pub west: f64,
    pub south: f64,
    pub east: f64,
}

impl Region {
    pub fn new(north: f64, west: f64, south: f64, east: f64) -> Self {
        Self {
            north,
            west,
            south,
            east,
        }
    }

    pub fn width(&self) -> f64 {
        self.east - self.west
    }

    pub fn height(&self) -> f64 {
        self.north - self.south
    }

    pub fn center(&self) -> (f64, f64) {
        ((self.north + self.south) / 2.0, (self.west + self.east) / 2.0)
    }

    pub fn has_positive_area(&self) -> bool {
        self.east > self.west && self.north > self.south
    }
}

/// An RGB color triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// Converts a latitude/longitude pair into a web-Mercator tile index at the
/// given integer zoom level.
pub fn coord_to_tile(lat: f64, lon: f64, zoom: u8) -> (u32, u32) {
    let n = 2_f64.powi(zoom as i32);
    let x = ((lon + 180.0) / 360.0 * n).floor();
    let lat_rad = lat.to_radians();
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n).floor();
    (x.max(0.0) as u32, y.max(0.0) as u32)
}

/// Inverse of [`coord_to_tile`]: the latitude/longitude of a tile's
/// top-left corner.
pub fn tile_to_coord(x: u32, y: u32, zoom: u8) -> (f64, f64) {
    let n = 2_f64.powi(zoom as i32);
    let lon = x as f64 / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y as f64 / n)).sinh().atan();
    (lat_rad.to_degrees(), lon)
}

/// Strict rectangle-overlap test. Rectangles that only touch along an edge
/// or corner do not overlap. Symmetric in its two arguments.
pub fn is_overlapping(a: &Region, b: &Region) -> bool {
    a.west < b.east && a.east > b.west && a.north > b.south && a.south < b.north
}

/// Parses a `#RRGGBB` or `RRGGBB` hex color (case-insensitive). Malformed
/// input (wrong length, non-hex digits) yields black rather than an error,
/// since upstream palette data is occasionally malformed and the caller
/// has no reasonable recovery beyond "treat it as absent."
pub fn parse_hex_color(s: &str) -> Rgb {
    let hex = s.trim_start_matches('#');
    if hex.len() != 6 {
        return Rgb::default();
    }
    let r = u8::from_str_radix(&hex[0..2], 16);
    let g = u8::from_str_radix(&hex[2..4], 16);
    let b = u8::from_str_radix(&hex[4..6], 16);
    match (r, g, b) {
        (Ok(r), Ok(g), Ok(b)) => Rgb::new(r, g, b),
        _ => Rgb::default(),
    }
}

/// Converts a kilometer radius to degrees at the equator, per the
/// operational approximation documented for radar effective range.
pub fn km_to_deg(km: f64) -> f64 {
    km * 360.0 / 40_075.0
}
