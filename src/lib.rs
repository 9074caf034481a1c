//! Region plotting library
//!
//! Renders the rectangular regions of a scenery materials manifest onto a
//! world map, one image per region file or one composite per directory.

pub mod basemap;
pub mod canvas;
pub mod compose;
pub mod error;
pub mod font;
pub mod geometry;
pub mod manifest;
pub mod palette;

pub use canvas::RenderTarget;
pub use compose::{BatchReport, CompositeReport, Composer, RenderOutcome, RenderStyle};
pub use error::{BasemapError, ParseError, RenderError, StyleError};
pub use geometry::{load_subregions, Rectangle};
pub use manifest::{resolve, Manifest, ManifestEntry};
pub use palette::{assign_colors, Color};
