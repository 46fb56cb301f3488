pub mod compositor;
pub mod pool;
pub mod renderer;
pub mod types;

pub use renderer::RegionRenderer;
pub use types::{Basemap, ImageFormat, SolidBasemap, CANONICAL_PALETTE};
