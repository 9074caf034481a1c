//! World landmass background loaded from a GeoJSON file.
//!
//! Natural Earth publishes its land layers as GeoJSON (`ne_110m_land.geojson`),
//! which is what the default world shape points at.

use std::fs;
use std::path::Path;

use geojson::{GeoJson, Geometry, Value};
use tracing::debug;

use crate::canvas::Canvas;
use crate::error::BasemapError;
use crate::palette::Color;

/// Polygon rings in lon/lat, exterior ring first.
pub type Polygon = Vec<Vec<(f64, f64)>>;

#[derive(Clone, Debug, Default)]
pub struct WorldShape {
    pub polygons: Vec<Polygon>,
}

impl WorldShape {
    pub fn load(path: &Path) -> Result<Self, BasemapError> {
        let text = fs::read_to_string(path).map_err(|source| BasemapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&text, path)
    }

    pub fn parse(text: &str, path: &Path) -> Result<Self, BasemapError> {
        let geojson: GeoJson = text.parse().map_err(|source| BasemapError::GeoJson {
            path: path.to_path_buf(),
            source: Box::new(source),
        })?;

        let mut shape = WorldShape::default();
        match geojson {
            GeoJson::FeatureCollection(collection) => {
                for feature in collection.features {
                    if let Some(geometry) = feature.geometry {
                        shape.add_geometry(geometry);
                    }
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(geometry) = feature.geometry {
                    shape.add_geometry(geometry);
                }
            }
            GeoJson::Geometry(geometry) => shape.add_geometry(geometry),
        }

        debug!("{}: {} land polygons", path.display(), shape.polygons.len());
        Ok(shape)
    }

    fn add_geometry(&mut self, geometry: Geometry) {
        match geometry.value {
            Value::Polygon(rings) => self.polygons.push(to_polygon(rings)),
            Value::MultiPolygon(polygons) => {
                self.polygons.extend(polygons.into_iter().map(to_polygon));
            }
            Value::GeometryCollection(geometries) => {
                for g in geometries {
                    self.add_geometry(g);
                }
            }
            // Points and lines have no area to paint.
            _ => {}
        }
    }

    /// Paint the landmass. `fill` of `None` leaves the interior transparent,
    /// `edge` of `None` skips the coastline.
    pub fn draw(&self, canvas: &mut Canvas, fill: Option<Color>, edge: Option<Color>) {
        if let Some(fill) = fill {
            for polygon in &self.polygons {
                canvas.fill_polygon(polygon, fill);
            }
        }
        if let Some(edge) = edge {
            for ring in self.polygons.iter().flatten() {
                canvas.stroke_polyline(ring, edge);
            }
        }
    }
}

fn to_polygon(rings: Vec<Vec<Vec<f64>>>) -> Polygon {
    rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .filter(|pos| pos.len() >= 2)
                .map(|pos| (pos[0], pos[1]))
                .collect()
        })
        .collect()
}

/// Load the world shape at `path` and draw it onto `canvas`.
///
/// Renders call this twice: once for the land fill before any regions, and
/// once at the very end with only an edge colour so coastlines stay visible
/// through region fills.
pub fn plot_world_shape(
    canvas: &mut Canvas,
    path: &Path,
    fill: Option<Color>,
    edge: Option<Color>,
) -> Result<(), BasemapError> {
    let shape = WorldShape::load(path)?;
    shape.draw(canvas, fill, edge);
    Ok(())
}
