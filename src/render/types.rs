//! Output image format and the canonical reflectivity palette.

use image::RgbaImage;

use crate::error::Result;
use crate::geo::{Region, Rgb};

/// Encoded output format for the final canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Png,
    Jpeg,
    Webp,
}

impl ImageFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "webp" => Some(Self::Webp),
            _ => None,
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
        }
    }

    /// Encodes `canvas` to bytes in this format.
    pub fn encode(&self, canvas: &RgbaImage) -> Result<Vec<u8>> {
        use std::io::Cursor;

        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);
        let format = match self {
            Self::Png => image::ImageFormat::Png,
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Webp => image::ImageFormat::WebP,
        };

        if *self == Self::Jpeg {
            // JPEG has no alpha channel; flatten onto black first.
            image::DynamicImage::ImageRgba8(canvas.clone())
                .to_rgb8()
                .write_to(&mut cursor, format)?;
        } else {
            canvas.write_to(&mut cursor, format)?;
        }
        Ok(buffer)
    }
}

/// The 13-bin canonical reflectivity ramp, 5-70 dBZ in 5 dBZ steps.
/// `CANONICAL_PALETTE[i]` is the output color for bin `i`.
pub const CANONICAL_PALETTE: [Rgb; 13] = [
    Rgb { r: 173, g: 216, b: 230 }, // 5-10 dBZ
    Rgb { r: 0, g: 0, b: 255 },     // 10-15 dBZ
    Rgb { r: 0, g: 0, b: 139 },     // 15-20 dBZ
    Rgb { r: 0, g: 255, b: 0 },     // 20-25 dBZ
    Rgb { r: 50, g: 205, b: 50 },   // 25-30 dBZ
    Rgb { r: 255, g: 255, b: 0 },   // 30-35 dBZ
    Rgb { r: 255, g: 215, b: 0 },   // 35-40 dBZ
    Rgb { r: 255, g: 165, b: 0 },   // 40-45 dBZ
    Rgb { r: 255, g: 140, b: 0 },   // 45-50 dBZ
    Rgb { r: 255, g: 0, b: 0 },     // 50-55 dBZ
    Rgb { r: 139, g: 0, b: 0 },     // 55-60 dBZ
    Rgb { r: 255, g: 0, b: 255 },   // 60-65 dBZ
    Rgb { r: 128, g: 0, b: 128 },   // 65-70 dBZ
];

/// A source of basemap imagery cropped to a region. The core engine treats
/// this as an opaque collaborator; no implementation here fetches real
/// tiles.
pub trait Basemap {
    fn fetch(&self, region: &Region, width: u32, height: u32) -> Result<RgbaImage>;
}

/// A flat-color basemap, for tests and as a trivial default when no real
/// tile-fetching collaborator is wired up.
pub struct SolidBasemap {
    pub color: Rgb,
}

impl SolidBasemap {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

impl Default for SolidBasemap {
    fn default() -> Self {
        Self::new(Rgb::new(224, 224, 224))
    }
}

impl Basemap for SolidBasemap {
    fn fetch(&self, _region: &Region, width: u32, height: u32) -> Result<RgbaImage> {
        let mut image = RgbaImage::new(width, height);
        for pixel in image.pixels_mut() {
            *pixel = image::Rgba([self.color.r, self.color.g, self.color.b, 255]);
        }
        Ok(image)
    }
}
