//! Map composition: basemap, regions in priority order, coastline overlay.
//!
//! Every artifact follows the same layering:
//! 1. world fill
//! 2. region rectangles, earlier manifest entries first
//! 3. world outline only, so coastlines are never buried under fills
//!
//! Loading a region file can fail without stopping a batch: the file is
//! logged and skipped. Failures that prevent an artifact (basemap, output
//! directory, image encoding, broken manifest) are returned as
//! [`RenderError`] for the caller to report.

use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};

use image::RgbaImage;
use rand::Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::basemap::plot_world_shape;
use crate::canvas::{Canvas, LegendEntry, RenderTarget};
use crate::error::{ParseError, RenderError, StyleError};
use crate::geometry::load_subregions;
use crate::manifest::{self, DEFAULT_MANIFEST_NAME};
use crate::palette::{self, Color};

/// Colours, transparency and figure size shared by all render modes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderStyle {
    /// GeoJSON land layer drawn as background
    pub world_shape: PathBuf,
    /// Land fill colour
    pub world_color: Color,
    /// Coastline colour of the final outline pass
    pub edge_color: Color,
    /// Region colour in single-file mode (composites use a generated palette)
    pub region_color: Color,
    /// Optional outline around each region rectangle, `"none"` for no outline
    #[serde(with = "palette::optional_color")]
    pub region_edge: Option<Color>,
    /// Region fill opacity, 0.0 to 1.0
    pub alpha: f32,
    /// Figure width in inches
    pub width: f32,
    /// Figure height in inches
    pub height: f32,
    /// Pixels per inch
    pub dpi: u32,
}

impl Default for RenderStyle {
    fn default() -> Self {
        Self {
            world_shape: PathBuf::from("world/ne_110m_land.geojson"),
            world_color: Color::rgb(192, 192, 192), // silver
            edge_color: Color::rgb(105, 105, 105),  // dimgray
            region_color: Color::rgb(0, 0, 255),
            region_edge: None,
            alpha: 0.5,
            width: 12.0,
            height: 9.0,
            dpi: 100,
        }
    }
}

impl RenderStyle {
    /// Load a style from JSON. Missing keys keep their defaults.
    pub fn load(path: &Path) -> Result<Self, StyleError> {
        let text = fs::read_to_string(path).map_err(|source| StyleError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| StyleError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Figure size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        let px = |inches: f32| ((inches * self.dpi as f32).round() as u32).max(1);
        (px(self.width), px(self.height))
    }
}

/// Result of rendering one region file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    /// Image written to this path.
    Written(PathBuf),
    /// The file declares no areas; nothing was written.
    Empty,
}

/// A region file that was left out of a batch or composite.
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: RenderError,
}

/// Per-file mode summary, entries in manifest order.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub written: Vec<PathBuf>,
    pub empty: Vec<PathBuf>,
    pub failed: Vec<SkippedFile>,
}

impl BatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Composite mode summary.
#[derive(Debug)]
pub struct CompositeReport {
    pub artifact: PathBuf,
    /// Files that contributed at least one rectangle, in draw order.
    pub drawn: Vec<PathBuf>,
    /// Legend labels, empty unless a legend was requested.
    pub legend: Vec<String>,
    pub empty: Vec<PathBuf>,
    pub skipped: Vec<SkippedFile>,
}

/// What one pass over a resolved file list put on the canvas.
#[derive(Debug, Default)]
struct DrawnRegions {
    drawn: Vec<(PathBuf, Color)>,
    empty: Vec<PathBuf>,
    skipped: Vec<SkippedFile>,
}

/// Renders region files and regions directories into PNG maps.
#[derive(Clone, Debug)]
pub struct Composer {
    output_dir: PathBuf,
    target: RenderTarget,
    style: RenderStyle,
    manifest_name: String,
    parallel: bool,
}

impl Composer {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            target: RenderTarget::default(),
            style: RenderStyle::default(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            parallel: false,
        }
    }

    pub fn target(mut self, target: RenderTarget) -> Self {
        self.target = target;
        self
    }

    pub fn style(mut self, style: RenderStyle) -> Self {
        self.style = style;
        self
    }

    pub fn manifest_name(mut self, name: impl Into<String>) -> Self {
        self.manifest_name = name.into();
        self
    }

    /// Render per-file batches on the rayon pool. Each file gets its own canvas.
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn manifest_path(&self, directory: &Path) -> PathBuf {
        directory.join(&self.manifest_name)
    }

    /// Render one region file to `<output>/<basename>.png`.
    ///
    /// Returns [`RenderOutcome::Empty`] without writing anything when the
    /// file declares no areas.
    pub fn render_single_file(&self, region_path: &Path) -> Result<RenderOutcome, RenderError> {
        let name = file_label(region_path)?;
        self.ensure_output_dir()?;
        let outfile = self.output_dir.join(format!("{}.png", name));
        info!("Converting {} into {}", region_path.display(), outfile.display());

        let mut canvas = self.new_canvas();
        plot_world_shape(&mut canvas, &self.style.world_shape, Some(self.style.world_color), None)?;

        let rects = load_subregions(region_path)?;
        if rects.is_empty() {
            debug!("{}: no areas, nothing to draw", region_path.display());
            return Ok(RenderOutcome::Empty);
        }
        canvas.fill_rectangles(&rects, self.style.region_color, self.style.alpha, self.style.region_edge);

        plot_world_shape(&mut canvas, &self.style.world_shape, None, Some(self.style.edge_color))?;
        save(canvas.finish(&name, &[]), &outfile)?;
        Ok(RenderOutcome::Written(outfile))
    }

    /// Render every region file listed by the directory's manifest to its own image.
    ///
    /// A broken manifest fails the whole call. A file that fails to render is
    /// logged and recorded in the report; the rest still render.
    pub fn render_per_file(&self, directory: &Path) -> Result<BatchReport, RenderError> {
        let files = manifest::resolve(&self.manifest_path(directory), None)?;
        info!("Rendering {} region files from {}", files.len(), directory.display());

        let results: Vec<(PathBuf, Result<RenderOutcome, RenderError>)> = if self.parallel {
            files
                .par_iter()
                .map(|path| (path.clone(), self.render_single_file(path)))
                .collect()
        } else {
            files
                .iter()
                .map(|path| (path.clone(), self.render_single_file(path)))
                .collect()
        };

        let mut report = BatchReport::default();
        for (path, result) in results {
            match result {
                Ok(RenderOutcome::Written(artifact)) => report.written.push(artifact),
                Ok(RenderOutcome::Empty) => report.empty.push(path),
                Err(error) => {
                    warn!("Cannot process {}: {}", path.display(), error);
                    report.failed.push(SkippedFile { path, error });
                }
            }
        }
        Ok(report)
    }

    /// Render all regions of a directory into one image.
    ///
    /// With `material`, only files declaring that material are drawn and the
    /// image is named after the material; otherwise it is named after the
    /// directory. Files are drawn in manifest order so higher priority
    /// regions land on top. Colours come from [`palette::assign_colors`]
    /// sized to the number of resolved files.
    pub fn render_composite<R: Rng + ?Sized>(
        &self,
        directory: &Path,
        material: Option<&str>,
        with_legend: bool,
        rng: &mut R,
    ) -> Result<CompositeReport, RenderError> {
        let name = match material {
            Some(material) => artifact_label(material)?,
            None => directory_label(directory)?,
        };
        self.ensure_output_dir()?;
        let outfile = self.output_dir.join(format!("{}.png", name));
        info!("Converting {} into {}", directory.display(), outfile.display());

        let files = manifest::resolve(&self.manifest_path(directory), material)?;
        let colors = palette::assign_colors(files.len(), rng);

        let mut canvas = self.new_canvas();
        let regions = self.draw_map(&mut canvas, &files, &colors)?;

        let legend: Vec<LegendEntry> = if with_legend {
            regions
                .drawn
                .iter()
                .map(|(path, color)| LegendEntry {
                    label: file_name_lossy(path),
                    color: *color,
                    alpha: self.style.alpha,
                })
                .collect()
        } else {
            Vec::new()
        };

        save(canvas.finish(&composite_title(material), &legend), &outfile)?;

        Ok(CompositeReport {
            artifact: outfile,
            drawn: regions.drawn.into_iter().map(|(path, _)| path).collect(),
            legend: legend.into_iter().map(|e| e.label).collect(),
            empty: regions.empty,
            skipped: regions.skipped,
        })
    }

    /// World fill, then the regions, then the coastline on top.
    fn draw_map(&self, canvas: &mut Canvas, files: &[PathBuf], colors: &[Color]) -> Result<DrawnRegions, RenderError> {
        plot_world_shape(canvas, &self.style.world_shape, Some(self.style.world_color), None)?;
        let regions = self.draw_regions(canvas, files, colors);
        plot_world_shape(canvas, &self.style.world_shape, None, Some(self.style.edge_color))?;
        Ok(regions)
    }

    /// Draw each file with its colour, in order. Broken files are skipped.
    fn draw_regions(&self, canvas: &mut Canvas, files: &[PathBuf], colors: &[Color]) -> DrawnRegions {
        let mut regions = DrawnRegions::default();

        for (path, &color) in files.iter().zip(colors) {
            match load_subregions(path) {
                Ok(rects) if rects.is_empty() => regions.empty.push(path.clone()),
                Ok(rects) => {
                    canvas.fill_rectangles(&rects, color, self.style.alpha, self.style.region_edge);
                    regions.drawn.push((path.clone(), color));
                }
                Err(error) => {
                    warn!("Skipping region {}: {}", path.display(), error);
                    regions.skipped.push(SkippedFile {
                        path: path.clone(),
                        error: RenderError::Parse(error),
                    });
                }
            }
        }
        regions
    }

    fn new_canvas(&self) -> Canvas {
        let (width, height) = self.style.pixel_size();
        Canvas::new(self.target, width, height)
    }

    fn ensure_output_dir(&self) -> Result<(), RenderError> {
        fs::create_dir_all(&self.output_dir).map_err(|source| RenderError::OutputDir {
            path: self.output_dir.clone(),
            source,
        })
    }
}

fn save(page: RgbaImage, path: &Path) -> Result<(), RenderError> {
    page.save(path).map_err(|source| RenderError::Image {
        path: path.to_path_buf(),
        source,
    })
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn composite_title(material: Option<&str>) -> String {
    match material {
        Some(material) => format!("Regions with material {}", material),
        None => "Available regions".to_string(),
    }
}

/// A material names the output file, so it must be one plain path component.
fn artifact_label(material: &str) -> Result<String, RenderError> {
    let mut components = Path::new(material).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) if name == OsStr::new(material) => Ok(material.to_string()),
        _ => Err(RenderError::InvalidArtifactName {
            name: material.to_string(),
        }),
    }
}

fn file_label(path: &Path) -> Result<String, RenderError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| RenderError::Unnamed { path: path.to_path_buf() })
}

/// Directory base name; `.` and friends are resolved first.
fn directory_label(directory: &Path) -> Result<String, RenderError> {
    if let Ok(label) = file_label(directory) {
        return Ok(label);
    }
    let canonical = directory.canonicalize().map_err(|source| {
        RenderError::Parse(ParseError::Io {
            path: directory.to_path_buf(),
            source,
        })
    })?;
    file_label(&canonical).map_err(|_| RenderError::Unnamed { path: directory.to_path_buf() })
}
