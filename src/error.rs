//! Error types for region loading, manifest resolution and rendering.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to turn an XML document into regions, rectangles or manifest entries.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed XML in {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("{}: area #{area} has no <{field}>", path.display())]
    MissingField {
        path: PathBuf,
        area: usize,
        field: &'static str,
    },

    #[error("{}: area #{area} <{field}> is not a number: {value:?}", path.display())]
    InvalidNumber {
        path: PathBuf,
        area: usize,
        field: &'static str,
        value: String,
    },
}

/// Failure to load the world shape used as the map background.
#[derive(Debug, Error)]
pub enum BasemapError {
    #[error("cannot read world shape {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid GeoJSON in {}: {source}", path.display())]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },
}

/// Anything that stops one artifact from being produced.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Basemap(#[from] BasemapError),

    #[error("cannot create output directory {}: {source}", path.display())]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("{} has no file name to derive an output name from", path.display())]
    Unnamed { path: PathBuf },

    #[error("material {name:?} cannot name an output file: it must be a single file name")]
    InvalidArtifactName { name: String },
}

/// Failure to load a JSON render style.
#[derive(Debug, Error)]
pub enum StyleError {
    #[error("cannot read style {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid style {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
