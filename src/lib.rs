//! radar-mosaic library
//!
//! Exposes the mosaicking/compositing engine for use by the CLI binary and
//! for testing.

pub mod cli;
pub mod config;
pub mod error;
pub mod geo;
pub mod http;
pub mod image_fetch;
pub mod logging;
pub mod registry;
pub mod render;

pub use config::{AppConfig, RenderConfig};
pub use error::{RadarError, Result};
pub use geo::{Region, Rgb};
pub use render::{Basemap, ImageFormat, RegionRenderer, SolidBasemap};
