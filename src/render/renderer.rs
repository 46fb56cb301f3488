//! End-to-end driver: region in, composited RGBA canvas out.

use image::{Rgba, RgbaImage};

use crate::config::RenderConfig;
use crate::error::Result;
use crate::geo::Region;
use crate::image_fetch;
use crate::registry;
use crate::render::compositor::{self, CompositeResult};
use crate::render::types::Basemap;

/// Orchestrates the full pipeline: region → station selection → parallel
/// fetch → mosaic → alpha-composite with a basemap.
pub struct RegionRenderer<B: Basemap> {
    basemap: B,
}

impl<B: Basemap> RegionRenderer<B> {
    pub fn new(basemap: B) -> Self {
        Self { basemap }
    }

    /// Renders `region` at `width` x `height` using `config`. Never fails
    /// because no station overlaps the region (that case logs a warning
    /// and yields a fully transparent radar layer over the basemap).
    pub fn render(
        &self,
        region: &Region,
        width: u32,
        height: u32,
        config: &RenderConfig,
    ) -> Result<RgbaImage> {
        let details = registry::load_region(region, config)?;
        if details.is_empty() {
            tracing::warn!("no station overlaps the requested region");
        }

        let images = image_fetch::fetch_images(&details)?;
        let stations: Vec<_> = details
            .into_iter()
            .zip(images)
            .filter_map(|(detail, image)| image.map(|image| (detail, image)))
            .collect();

        let CompositeResult { canvas, used_radars } =
            compositor::composite(&stations, region, width, height, config);
        tracing::info!(stations = ?used_radars, "composited radar mosaic");

        let basemap = self.basemap.fetch(region, width, height)?;
        Ok(alpha_composite(&basemap, &canvas))
    }
}

/// `out.rgb = base.rgb*(1-a) + radar.rgb*a`, per pixel. Alpha of the
/// result is always opaque: the basemap is assumed to already cover the
/// full canvas.
fn alpha_composite(base: &RgbaImage, radar: &RgbaImage) -> RgbaImage {
    let (width, height) = base.dimensions();
    let mut out = RgbaImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let base_px = base.get_pixel(x, y);
            let radar_px = radar.get_pixel(x, y);
            let a = radar_px.0[3] as f64 / 255.0;
            let blend = |b: u8, r: u8| -> u8 {
                (b as f64 * (1.0 - a) + r as f64 * a).round() as u8
            };
            out.put_pixel(
                x,
                y,
                Rgba([
                    blend(base_px.0[0], radar_px.0[0]),
                    blend(base_px.0[1], radar_px.0[1]),
                    blend(base_px.0[2], radar_px.0[2]),
                    255,
                ]),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geo::Rgb;
    use crate::render::types::SolidBasemap;

    #[test]
    fn alpha_composite_passes_through_fully_opaque_radar() {
        let mut base = RgbaImage::new(1, 1);
        base.put_pixel(0, 0, Rgba([0, 0, 0, 255]));
        let mut radar = RgbaImage::new(1, 1);
        radar.put_pixel(0, 0, Rgba([255, 0, 0, 255]));

        let out = alpha_composite(&base, &radar);
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
    }

    #[test]
    fn alpha_composite_keeps_base_when_radar_transparent() {
        let mut base = RgbaImage::new(1, 1);
        base.put_pixel(0, 0, Rgba([10, 20, 30, 255]));
        let radar = RgbaImage::new(1, 1);

        let out = alpha_composite(&base, &radar);
        assert_eq!(out.get_pixel(0, 0).0, [10, 20, 30, 255]);
    }

    #[test]
    fn renderer_with_no_stations_falls_back_to_basemap() {
        let renderer = RegionRenderer::new(SolidBasemap::new(Rgb::new(5, 6, 7)));
        let region = Region::new(1.0, -1.0, -1.0, 1.0);
        let config = RenderConfig::default();
        let result = compositor::composite(&[], &region, 10, 10, &config);
        let basemap = renderer.basemap.fetch(&region, 10, 10).unwrap();
        let out = alpha_composite(&basemap, &result.canvas);
        assert_eq!(out.get_pixel(0, 0).0, [5, 6, 7, 255]);
    }
}
