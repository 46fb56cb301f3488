//! Per-station crop/resize geometry, the analytic Voronoi-style partition,
//! staleness striping, and palette remapping. The centerpiece of the engine.

use image::{DynamicImage, Rgba, RgbaImage};

use crate::config::RenderConfig;
use crate::geo::{is_overlapping, km_to_deg, Region, Rgb};
use crate::registry::StationDetail;
use crate::render::pool::CompositorPool;
use crate::render::types::CANONICAL_PALETTE;

/// A station's resampled contribution, already aligned to the output
/// canvas's coordinate system.
struct StationGeometry {
    roi: RgbaImage,
    /// Canvas-pixel coordinates of `roi`'s top-left corner.
    px: i64,
    py: i64,
}

/// A station with everything the partition rule needs, once its geometry
/// has been computed.
struct RetainedStation<'a> {
    detail: &'a StationDetail,
    geometry: StationGeometry,
    priority: i32,
    range_deg: f64,
    stale: bool,
}

pub struct CompositeResult {
    pub canvas: RgbaImage,
    pub used_radars: Vec<String>,
}

/// Computes the crop/resize/trim geometry described in the per-station
/// geometry steps: crop to the region's overlap with the station's native
/// bounds, resize with nearest-neighbor sampling so source and output
/// pixels align at the fractional crop boundary, then trim the floor
/// rounding error back out. Returns `None` when the station's bounds don't
/// overlap the region, or the resulting ROI would be empty.
fn compute_geometry(
    bounds: &Region,
    source: &DynamicImage,
    region: &Region,
    canvas_w: u32,
    canvas_h: u32,
) -> Option<StationGeometry> {
    if !bounds.has_positive_area() || !is_overlapping(bounds, region) {
        return None;
    }

    let src = source.to_rgba8();
    let (src_w, src_h) = (src.width(), src.height());
    if src_w == 0 || src_h == 0 {
        return None;
    }

    // Step 1: fractional crop offsets, in source pixels, on each side.
    let scale_x = src_w as f64 / bounds.width();
    let scale_y = src_h as f64 / bounds.height();
    let crop_left = (region.west - bounds.west) * scale_x;
    let crop_right = (bounds.east - region.east) * scale_x;
    let crop_top = (bounds.north - region.north) * scale_y;
    let crop_bottom = (region.south - bounds.south) * scale_y;

    // Step 2: floor to integer source-pixel offsets (may be negative when
    // the region extends past the station's native bounds).
    let crop_left_floor = crop_left.floor();
    let crop_top_floor = crop_top.floor();
    let crop_right_floor = crop_right.floor();
    let crop_bottom_floor = crop_bottom.floor();

    // Step 3: cropped rectangle in source pixels, clamped to the source raster.
    let crop_x0 = crop_left_floor as i64;
    let crop_x1 = src_w as i64 - crop_right_floor as i64;
    let crop_y0 = crop_top_floor as i64;
    let crop_y1 = src_h as i64 - crop_bottom_floor as i64;
    let crop_w = (crop_x1 - crop_x0).max(0) as u32;
    let crop_h = (crop_y1 - crop_y0).max(0) as u32;
    if crop_w == 0 || crop_h == 0 {
        return None;
    }

    let mut cropped = RgbaImage::new(crop_w, crop_h);
    let copy_x0 = crop_x0.max(0);
    let copy_y0 = crop_y0.max(0);
    let copy_x1 = crop_x1.min(src_w as i64);
    let copy_y1 = crop_y1.min(src_h as i64);
    for y in copy_y0.max(0)..copy_y1.max(0) {
        for x in copy_x0.max(0)..copy_x1.max(0) {
            let pixel = *src.get_pixel(x as u32, y as u32);
            cropped.put_pixel((x - crop_x0) as u32, (y - crop_y0) as u32, pixel);
        }
    }

    // Steps 4-5: resize so one output pixel equals one source pixel at the
    // fractional (not floored) crop boundary.
    let out_scale_x = canvas_w as f64 / region.width();
    let out_scale_y = canvas_h as f64 / region.height();
    let px_per_src_x = out_scale_x / scale_x;
    let px_per_src_y = out_scale_y / scale_y;

    let intermediate_w = ((crop_w as f64) * px_per_src_x).round().max(1.0) as u32;
    let intermediate_h = ((crop_h as f64) * px_per_src_y).round().max(1.0) as u32;
    let resized = image::imageops::resize(
        &cropped,
        intermediate_w,
        intermediate_h,
        image::imageops::FilterType::Nearest,
    );

    // Step 6: trim the fractional remainder, expressed in output pixels.
    let remainder_left = crop_left - crop_left_floor;
    let remainder_top = crop_top - crop_top_floor;
    let trim_left = ((remainder_left * px_per_src_x).round() as u32).min(intermediate_w - 1);
    let trim_top = ((remainder_top * px_per_src_y).round() as u32).min(intermediate_h - 1);
    let trim_width = intermediate_w.saturating_sub(trim_left);
    let trim_height = intermediate_h.saturating_sub(trim_top);
    if trim_width == 0 || trim_height == 0 {
        return None;
    }
    let roi = image::imageops::crop_imm(&resized, trim_left, trim_top, trim_width, trim_height)
        .to_image();

    let overlap_west = region.west.max(bounds.west);
    let overlap_north = region.north.min(bounds.north);
    let px = ((overlap_west - region.west) * out_scale_x).round() as i64;
    let py = ((region.north - overlap_north) * out_scale_y).round() as i64;

    Some(StationGeometry { roi, px, py })
}

type Interval = (f64, f64);

fn intersect_with(intervals: &mut Vec<Interval>, bound: Interval) {
    intervals.retain_mut(|iv| {
        iv.0 = iv.0.max(bound.0);
        iv.1 = iv.1.min(bound.1);
        iv.0 < iv.1
    });
}

fn subtract(intervals: &mut Vec<Interval>, remove: Interval) {
    let mut result = Vec::with_capacity(intervals.len());
    for &(a, b) in intervals.iter() {
        if remove.1 <= a || remove.0 >= b {
            result.push((a, b));
            continue;
        }
        if remove.0 > a {
            result.push((a, remove.0));
        }
        if remove.1 < b {
            result.push((remove.1, b));
        }
    }
    *intervals = result;
}

/// The x-interval of a disk's intersection with the horizontal line
/// `y = y_lat`, or `None` if the line misses the disk entirely.
fn disk_row_interval(center_lon: f64, center_lat: f64, range: f64, y_lat: f64) -> Option<Interval> {
    let dy = y_lat - center_lat;
    let discriminant = range * range - dy * dy;
    if discriminant < 0.0 {
        return None;
    }
    let half = discriminant.sqrt();
    Some((center_lon - half, center_lon + half))
}

/// The half-line on `S`'s side of the perpendicular bisector of `S`-`N`, at
/// row `y_lat`.
fn bisector_row_interval(s: (f64, f64), n: (f64, f64), y_lat: f64) -> Interval {
    let a = 2.0 * (n.0 - s.0);
    let b = 2.0 * y_lat * (n.1 - s.1) + (s.0 * s.0 + s.1 * s.1) - (n.0 * n.0 + n.1 * n.1);
    if a.abs() < 1e-12 {
        return if b <= 0.0 {
            (f64::NEG_INFINITY, f64::INFINITY)
        } else {
            (0.0, 0.0)
        };
    }
    let x0 = -b / a;
    if a > 0.0 {
        (f64::NEG_INFINITY, x0)
    } else {
        (x0, f64::INFINITY)
    }
}

enum NeighborRule {
    Dominant,
    Bisector,
    Ignore,
}

fn classify(s: &RetainedStation, n: &RetainedStation) -> NeighborRule {
    if n.priority > s.priority {
        NeighborRule::Dominant
    } else if n.priority == s.priority {
        if n.range_deg < s.range_deg {
            NeighborRule::Dominant
        } else if n.range_deg > s.range_deg {
            NeighborRule::Ignore
        } else {
            NeighborRule::Bisector
        }
    } else {
        NeighborRule::Ignore
    }
}

/// Analytic per-scanline partition: for each station, each other station,
/// and each canvas row its ROI touches, computes the owned x-interval set
/// and copies exactly those columns.
fn partition_analytic(
    canvas: &mut RgbaImage,
    stations: &[RetainedStation],
    region: &Region,
    out_scale_x: f64,
    out_scale_y: f64,
) -> Vec<String> {
    let canvas_w = canvas.width() as i64;
    let canvas_h = canvas.height() as i64;
    let mut used = Vec::new();

    for (i, s) in stations.iter().enumerate() {
        let roi_w = s.geometry.roi.width() as i64;
        let roi_h = s.geometry.roi.height() as i64;
        let row_y0 = s.geometry.py.max(0);
        let row_y1 = (s.geometry.py + roi_h).min(canvas_h);
        let col_x0 = s.geometry.px.max(0);
        let col_x1 = (s.geometry.px + roi_w).min(canvas_w);
        if row_y0 >= row_y1 || col_x0 >= col_x1 {
            continue;
        }

        let mut contributed = false;

        for canvas_y in row_y0..row_y1 {
            let y_lat = region.north - (canvas_y as f64 + 0.5) / out_scale_y;

            let Some(own_disk) = disk_row_interval(
                station_lon(s),
                station_lat(s),
                s.range_deg,
                y_lat,
            ) else {
                continue;
            };

            let mut owned = vec![own_disk];
            intersect_with(&mut owned, (col_x_to_lon(col_x0, region, out_scale_x), col_x_to_lon(col_x1, region, out_scale_x)));

            for (j, n) in stations.iter().enumerate() {
                if i == j {
                    continue;
                }
                match classify(s, n) {
                    NeighborRule::Dominant => {
                        if let Some(disk) = disk_row_interval(station_lon(n), station_lat(n), n.range_deg, y_lat) {
                            subtract(&mut owned, disk);
                        }
                    }
                    NeighborRule::Bisector => {
                        let half =
                            bisector_row_interval((station_lon(s), station_lat(s)), (station_lon(n), station_lat(n)), y_lat);
                        intersect_with(&mut owned, half);
                    }
                    NeighborRule::Ignore => {}
                }
                if owned.is_empty() {
                    break;
                }
            }

            if owned.is_empty() {
                continue;
            }

            let roi_row = canvas_y - s.geometry.py;
            let stripe_transparent =
                s.stale && canvas_y.rem_euclid(4) < 2;

            for (lon_a, lon_b) in owned {
                let x0 = lon_to_col(lon_a, region, out_scale_x).max(col_x0);
                let x1 = lon_to_col(lon_b, region, out_scale_x).min(col_x1);
                if x0 >= x1 {
                    continue;
                }
                for canvas_x in x0..x1 {
                    let roi_col = canvas_x - s.geometry.px;
                    let pixel = if stripe_transparent {
                        Rgba([0, 0, 0, 0])
                    } else {
                        *s.geometry.roi.get_pixel(roi_col as u32, roi_row as u32)
                    };
                    if pixel.0[3] != 0 {
                        contributed = true;
                    }
                    canvas.put_pixel(canvas_x as u32, canvas_y as u32, pixel);
                }
            }
        }

        if contributed {
            used.push(s.detail.code().to_string());
        }
    }

    used
}

fn station_lon(s: &RetainedStation) -> f64 {
    s.detail.summary.lon
}

fn station_lat(s: &RetainedStation) -> f64 {
    s.detail.summary.lat
}

fn col_x_to_lon(x: i64, region: &Region, out_scale_x: f64) -> f64 {
    region.west + x as f64 / out_scale_x
}

fn lon_to_col(lon: f64, region: &Region, out_scale_x: f64) -> i64 {
    ((lon - region.west) * out_scale_x).round() as i64
}

/// Legacy grid-sampling partition, retained behind `use_grid_partition` for
/// debugging parity with the original implementation. Samples the nearest
/// eligible station every `check_radar_dist_every_px` pixels using the
/// `(2x + w) / 2` center-of-cell formula and assigns the whole cell to it.
fn partition_grid(
    canvas: &mut RgbaImage,
    stations: &[RetainedStation],
    region: &Region,
    out_scale_x: f64,
    out_scale_y: f64,
    step: u32,
) -> Vec<String> {
    let mut used = std::collections::BTreeSet::new();
    let canvas_w = canvas.width();
    let canvas_h = canvas.height();

    let mut cell_y = 0u32;
    while cell_y < canvas_h {
        let center_y = (2 * cell_y + step) as f64 / 2.0;
        let y_lat = region.north - center_y / out_scale_y;

        let mut cell_x = 0u32;
        while cell_x < canvas_w {
            let center_x = (2 * cell_x + step) as f64 / 2.0;
            let x_lon = region.west + center_x / out_scale_x;

            if let Some((_, station)) = stations
                .iter()
                .enumerate()
                .filter(|(_, s)| {
                    let d = ((x_lon - station_lon(s)).powi(2) + (y_lat - station_lat(s)).powi(2)).sqrt();
                    d <= s.range_deg
                })
                .min_by(|(_, a), (_, b)| {
                    let da = (x_lon - station_lon(a)).hypot(y_lat - station_lat(a));
                    let db = (x_lon - station_lon(b)).hypot(y_lat - station_lat(b));
                    b.priority
                        .cmp(&a.priority)
                        .then(da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal))
                })
            {
                let roi_w = station.geometry.roi.width() as i64;
                let roi_h = station.geometry.roi.height() as i64;
                for y in cell_y..(cell_y + step).min(canvas_h) {
                    for x in cell_x..(cell_x + step).min(canvas_w) {
                        let roi_x = x as i64 - station.geometry.px;
                        let roi_y = y as i64 - station.geometry.py;
                        if roi_x < 0 || roi_y < 0 || roi_x >= roi_w || roi_y >= roi_h {
                            continue;
                        }
                        let stripe_transparent = station.stale && (y as i64).rem_euclid(4) < 2;
                        let pixel = if stripe_transparent {
                            Rgba([0, 0, 0, 0])
                        } else {
                            *station.geometry.roi.get_pixel(roi_x as u32, roi_y as u32)
                        };
                        if pixel.0[3] != 0 {
                            used.insert(station.detail.code().to_string());
                        }
                        canvas.put_pixel(x, y, pixel);
                    }
                }
            }
            cell_x += step;
        }
        cell_y += step;
    }

    used.into_iter().collect()
}

/// Replaces every non-transparent canvas pixel matching a palette entry
/// (within tolerance) with the corresponding canonical bin color. Uses the
/// first retained station's palette, per the documented upstream
/// assumption that all stations share one palette.
fn remap_palette(canvas: &mut RgbaImage, palette: &[Rgb]) {
    // Source radar PNGs are lossily re-encoded relative to their declared
    // legend colors, so an exact match is too strict; this is generous
    // enough to catch that drift without conflating genuinely distinct
    // bins on a 13-entry ramp.
    const TOLERANCE: i32 = 130;

    let distance = |pixel: Rgba<u8>, color: &Rgb| -> i32 {
        let dr = pixel.0[0] as i32 - color.r as i32;
        let dg = pixel.0[1] as i32 - color.g as i32;
        let db = pixel.0[2] as i32 - color.b as i32;
        dr * dr + dg * dg + db * db
    };

    for pixel in canvas.pixels_mut() {
        if pixel.0[3] == 0 {
            continue;
        }
        let nearest = palette
            .iter()
            .enumerate()
            .map(|(i, c)| (i, distance(*pixel, c)))
            .min_by_key(|(_, d)| *d);
        if let Some((index, d)) = nearest {
            if d <= TOLERANCE * TOLERANCE {
                let canonical = CANONICAL_PALETTE[index.min(CANONICAL_PALETTE.len() - 1)];
                *pixel = Rgba([canonical.r, canonical.g, canonical.b, pixel.0[3]]);
            }
        }
    }
}

/// Composites every station's image into a single canvas of `width` x
/// `height`, covering `region`. Stations whose geometry fails to compute
/// (no overlap, degenerate crop) contribute nothing rather than aborting
/// the render.
pub fn composite(
    stations: &[(StationDetail, DynamicImage)],
    region: &Region,
    width: u32,
    height: u32,
    config: &RenderConfig,
) -> CompositeResult {
    let out_scale_x = width as f64 / region.width();
    let out_scale_y = height as f64 / region.height();

    // Per-station crop/resize geometry (§4.5 steps 1-6) is independent
    // across stations; compute it in a bounded pool and keep only the
    // stations whose geometry actually resolved to a non-empty ROI.
    let pool = CompositorPool::new(config.max_concurrent_threads);
    let region = *region;
    let jobs: Vec<_> = stations
        .iter()
        .map(|(detail, image)| {
            let bounds = detail.summary.bounds;
            let image = image.clone();
            move || compute_geometry(&bounds, &image, &region, width, height)
        })
        .collect();
    let geometries = pool.run(jobs);

    let mut retained = Vec::new();
    for ((detail, _image), geometry) in stations.iter().zip(geometries) {
        let Some(geometry) = geometry else { continue };
        let code = detail.code();
        retained.push(RetainedStation {
            detail,
            geometry,
            priority: config.priority(code),
            range_deg: km_to_deg(config.range_km(code)),
            stale: config.stripe_on_old_radars
                && detail.is_stale(chrono::Utc::now(), config.declare_old_after_mins),
        });
    }
    let region = &region;

    let mut canvas = RgbaImage::new(width, height);

    if retained.is_empty() {
        tracing::warn!("no station overlaps the requested region");
        return CompositeResult {
            canvas,
            used_radars: Vec::new(),
        };
    }

    let first_palette = &retained[0].detail.palette;
    for station in retained.iter().skip(1) {
        if !station.detail.palette.is_empty() && station.detail.palette != *first_palette {
            tracing::warn!(
                code = %station.detail.code(),
                "station palette differs from the first retained station's; remap may be inaccurate"
            );
        }
    }

    let used_radars = if config.use_grid_partition {
        partition_grid(
            &mut canvas,
            &retained,
            region,
            out_scale_x,
            out_scale_y,
            config.check_radar_dist_every_px,
        )
    } else {
        partition_analytic(&mut canvas, &retained, region, out_scale_x, out_scale_y)
    };

    remap_palette(&mut canvas, first_palette);

    CompositeResult {
        canvas,
        used_radars,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::registry::{Frame, StationSummary};
    use image::Rgba as ImgRgba;

    fn solid_image(width: u32, height: u32, color: [u8; 4]) -> DynamicImage {
        let mut img = RgbaImage::new(width, height);
        for p in img.pixels_mut() {
            *p = ImgRgba(color);
        }
        DynamicImage::ImageRgba8(img)
    }

    fn station(code: &str, lon: f64, lat: f64, bounds: Region) -> StationDetail {
        StationDetail {
            summary: StationSummary {
                code: code.to_string(),
                city: "Test".to_string(),
                station_name: "Test".to_string(),
                lat,
                lon,
                bounds,
            },
            frames: vec![Frame {
                timestamp_utc: chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string(),
                image_url: "https://example.com/a.png".to_string(),
            }],
            palette: vec![],
        }
    }

    #[test]
    fn single_station_fills_region() {
        let bounds = Region::new(0.0, 0.0, -1.0, 1.0);
        let detail = station("AAA", 0.5, -0.5, bounds);
        let image = solid_image(100, 100, [10, 20, 30, 255]);
        let mut config = RenderConfig::default();
        config.radar_priority.insert("AAA".to_string(), 0);
        config.radar_range_override.insert("AAA".to_string(), 400.0);

        let result = composite(&[(detail, image)], &bounds, 100, 100, &config);
        assert_eq!(result.used_radars, vec!["AAA".to_string()]);
        let center = result.canvas.get_pixel(50, 50);
        assert_eq!(center.0[3], 255);
    }

    #[test]
    fn no_overlap_yields_empty_canvas() {
        let bounds = Region::new(0.0, 0.0, -1.0, 1.0);
        let detail = station("AAA", 0.5, -0.5, bounds);
        let image = solid_image(10, 10, [10, 20, 30, 255]);
        let config = RenderConfig::default();

        let far_region = Region::new(50.0, 50.0, 49.0, 51.0);
        let result = composite(&[(detail, image)], &far_region, 20, 20, &config);
        assert!(result.used_radars.is_empty());
        assert!(result.canvas.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn exclusion_keeps_station_out_of_used_radars() {
        let bounds = Region::new(0.0, 0.0, -1.0, 1.0);
        let detail = station("PWK", 0.5, -0.5, bounds);
        let image = solid_image(50, 50, [1, 2, 3, 255]);
        let mut config = RenderConfig::default();
        config.exclude_radar.push("PWK".to_string());

        // Exclusion happens in the registry layer (list_in_region); the
        // compositor itself just has nothing to composite here.
        let result = composite(&[], &bounds, 50, 50, &config);
        assert!(!result.used_radars.contains(&"PWK".to_string()));
        let _ = (detail, image);
    }

    #[test]
    fn palette_remap_is_idempotent() {
        let mut canvas = RgbaImage::new(1, 1);
        canvas.put_pixel(0, 0, ImgRgba([0, 0, 139, 255]));
        let palette = vec![Rgb::new(255, 255, 255), Rgb::new(0, 0, 255)];
        remap_palette(&mut canvas, &palette);
        let once = *canvas.get_pixel(0, 0);
        remap_palette(&mut canvas, &palette);
        let twice = *canvas.get_pixel(0, 0);
        assert_eq!(once, twice);
        assert_eq!(once.0, [0, 0, 255, 255]);
    }

    #[test]
    fn bisector_splits_two_equal_stations() {
        let s = (0.0, 0.0);
        let n = (2.0, 0.0);
        let half = bisector_row_interval(s, n, 0.0);
        assert!((half.1 - 1.0).abs() < 1e-9);
        assert_eq!(half.0, f64::NEG_INFINITY);
    }

    #[test]
    fn disk_interval_is_none_outside_latitude_band() {
        assert!(disk_row_interval(0.0, 0.0, 1.0, 5.0).is_none());
        assert!(disk_row_interval(0.0, 0.0, 1.0, 0.0).is_some());
    }
}
