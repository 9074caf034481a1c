//! Region geometry: the lon/lat rectangles declared by a region file.

use std::fs;
use std::path::Path;

use roxmltree::{Document, Node};

use crate::error::ParseError;

/// One axis-aligned area in degrees.
///
/// Values are kept exactly as parsed. Nothing guarantees `lon_min < lon_max`
/// or `lat_min < lat_max`; drawing code treats an inverted rectangle as the
/// area it spans.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rectangle {
    pub lon_min: f64,
    pub lon_max: f64,
    pub lat_min: f64,
    pub lat_max: f64,
}

impl Rectangle {
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Self {
        Self { lon_min, lon_max, lat_min, lat_max }
    }

    /// Longitude span as (west, east) regardless of declaration order.
    pub fn lon_span(&self) -> (f64, f64) {
        (self.lon_min.min(self.lon_max), self.lon_min.max(self.lon_max))
    }

    /// Latitude span as (south, north) regardless of declaration order.
    pub fn lat_span(&self) -> (f64, f64) {
        (self.lat_min.min(self.lat_max), self.lat_min.max(self.lat_max))
    }
}

/// Load every `<area>` of a region file, in document order.
pub fn load_subregions(path: &Path) -> Result<Vec<Rectangle>, ParseError> {
    let text = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_subregions(&text, path)
}

/// Parse region XML already in memory. `path` is only used in error messages.
pub fn parse_subregions(text: &str, path: &Path) -> Result<Vec<Rectangle>, ParseError> {
    let doc = Document::parse(text).map_err(|source| ParseError::Xml {
        path: path.to_path_buf(),
        source,
    })?;

    doc.root_element()
        .children()
        .filter(|n| n.has_tag_name("area"))
        .enumerate()
        .map(|(index, area)| {
            let field = |name| area_field(area, name, index, path);
            Ok(Rectangle::new(
                field("lon1")?,
                field("lon2")?,
                field("lat1")?,
                field("lat2")?,
            ))
        })
        .collect()
}

fn area_field(area: Node, name: &'static str, index: usize, path: &Path) -> Result<f64, ParseError> {
    let child = area
        .children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| ParseError::MissingField {
            path: path.to_path_buf(),
            area: index,
            field: name,
        })?;

    let raw = child.text().unwrap_or("");
    raw.trim().parse::<f64>().map_err(|_| ParseError::InvalidNumber {
        path: path.to_path_buf(),
        area: index,
        field: name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn p() -> PathBuf {
        PathBuf::from("test.xml")
    }

    #[test]
    fn test_parses_areas_in_document_order() {
        let xml = r#"<PropertyList>
            <name>Alps</name>
            <area><lon1>5.5</lon1><lon2>16.0</lon2><lat1>43.0</lat1><lat2>48.25</lat2></area>
            <area><lon1>-10</lon1><lon2>-5</lon2><lat1>36</lat1><lat2>44</lat2></area>
        </PropertyList>"#;

        let rects = parse_subregions(xml, &p()).unwrap();
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0], Rectangle::new(5.5, 16.0, 43.0, 48.25));
        assert_eq!(rects[1], Rectangle::new(-10.0, -5.0, 36.0, 44.0));
    }

    #[test]
    fn test_no_areas_is_empty_not_error() {
        let rects = parse_subregions("<PropertyList><name>x</name></PropertyList>", &p()).unwrap();
        assert!(rects.is_empty());
    }

    #[test]
    fn test_inverted_rectangle_kept_verbatim() {
        let xml = "<r><area><lon1>10</lon1><lon2>-10</lon2><lat1>5</lat1><lat2>-5</lat2></area></r>";
        let rects = parse_subregions(xml, &p()).unwrap();
        assert_eq!(rects[0].lon_min, 10.0);
        assert_eq!(rects[0].lon_span(), (-10.0, 10.0));
        assert_eq!(rects[0].lat_span(), (-5.0, 5.0));
    }

    #[test]
    fn test_missing_field_is_error() {
        let xml = "<r><area><lon1>1</lon1><lon2>2</lon2><lat1>3</lat1></area></r>";
        match parse_subregions(xml, &p()) {
            Err(ParseError::MissingField { field, area, .. }) => {
                assert_eq!(field, "lat2");
                assert_eq!(area, 0);
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_field_is_error() {
        let xml = "<r><area><lon1>east</lon1><lon2>2</lon2><lat1>3</lat1><lat2>4</lat2></area></r>";
        assert!(matches!(
            parse_subregions(xml, &p()),
            Err(ParseError::InvalidNumber { field: "lon1", .. })
        ));
    }

    #[test]
    fn test_malformed_xml_is_error() {
        assert!(matches!(
            parse_subregions("<r><area>", &p()),
            Err(ParseError::Xml { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_subregions(&dir.path().join("nope.xml"));
        assert!(matches!(result, Err(ParseError::Io { .. })));
    }
}
