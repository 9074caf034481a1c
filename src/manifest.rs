//! Materials manifest: which region files exist and in what priority order.
//!
//! The manifest lists region files with `<region include="..."/>`. Declaration
//! order is draw order: later entries have higher priority and end up on top.
//! Includes are resolved by basename against the manifest's own directory,
//! so the manifest and its region files must sit side by side.
//!
//! Resolution failures are not tolerated here. A broken manifest, or a
//! candidate file that cannot be scanned for a material, is returned to the
//! caller as a [`ParseError`].

use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::Document;
use tracing::debug;

use crate::error::ParseError;

/// Default manifest file name inside a regions directory.
pub const DEFAULT_MANIFEST_NAME: &str = "materials.xml";

/// One `<region include>` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Position among the include-carrying declarations; higher draws later.
    pub priority: usize,
    /// The include attribute exactly as written.
    pub include: String,
    /// The include resolved to a sibling of the manifest.
    pub path: PathBuf,
}

/// Parsed manifest, entries in declaration order.
#[derive(Clone, Debug, Default)]
pub struct Manifest {
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let text = read(path)?;
        Self::parse(&text, path)
    }

    /// Parse manifest XML. Includes are resolved relative to `path`'s directory.
    pub fn parse(text: &str, path: &Path) -> Result<Self, ParseError> {
        let doc = parse_xml(text, path)?;
        let dir = path.parent().unwrap_or_else(|| Path::new(""));

        let mut entries = Vec::new();
        for node in doc.root_element().children().filter(|n| n.has_tag_name("region")) {
            let Some(include) = node.attribute("include") else {
                continue;
            };
            // Last segment taken literally, so "" and "sub/.." still yield an
            // entry; such a path fails when it is read.
            let basename = include.rsplit('/').next().unwrap_or(include);
            entries.push(ManifestEntry {
                priority: entries.len(),
                include: include.to_string(),
                path: dir.join(basename),
            });
        }

        debug!("{}: {} region includes", path.display(), entries.len());
        Ok(Self { entries })
    }

    /// Resolved region paths in priority order.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.entries.iter().map(|e| e.path.as_path())
    }
}

/// Resolve the region files of a manifest in priority order.
///
/// With `material` set, only files that themselves declare a material with
/// exactly that name are kept. Order is never changed and repeated includes
/// are kept as repeated.
pub fn resolve(manifest_path: &Path, material: Option<&str>) -> Result<Vec<PathBuf>, ParseError> {
    let manifest = Manifest::load(manifest_path)?;

    let Some(material) = material else {
        return Ok(manifest.paths().map(Path::to_path_buf).collect());
    };

    let mut selected = Vec::new();
    for path in manifest.paths() {
        if file_defines_material(path, material)? {
            selected.push(path.to_path_buf());
        }
    }
    debug!(
        "material {:?}: {} of {} region files match",
        material,
        selected.len(),
        manifest.entries.len()
    );
    Ok(selected)
}

/// Whether the region file at `path` declares a material named `material`.
pub fn file_defines_material(path: &Path, material: &str) -> Result<bool, ParseError> {
    let text = read(path)?;
    defines_material(&text, path, material)
}

/// A `<material>` may carry several `<name>` children; any exact match counts.
/// Text is compared as written, surrounding whitespace included.
pub fn defines_material(text: &str, path: &Path, material: &str) -> Result<bool, ParseError> {
    let doc = parse_xml(text, path)?;
    Ok(doc
        .descendants()
        .filter(|n| n.has_tag_name("material"))
        .flat_map(|m| m.children().filter(|n| n.has_tag_name("name")))
        .any(|name| name.text() == Some(material)))
}

fn read(path: &Path) -> Result<String, ParseError> {
    fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_xml<'a>(text: &'a str, path: &Path) -> Result<Document<'a>, ParseError> {
    Document::parse(text).map_err(|source| ParseError::Xml {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).unwrap();
        path
    }

    fn region_with_material(material: &str) -> String {
        format!(
            "<PropertyList><material><name>{}</name></material>\
             <area><lon1>0</lon1><lon2>1</lon2><lat1>0</lat1><lat2>1</lat2></area></PropertyList>",
            material
        )
    }

    #[test]
    fn test_entries_in_declaration_order() {
        let xml = r#"<PropertyList>
            <region n="0" include="Materials/regions/a.xml"/>
            <region n="1"/>
            <region n="2" include="Materials/regions/b.xml"/>
            <material><name>Forest</name></material>
            <region n="3" include="c.xml"/>
        </PropertyList>"#;
        let manifest = Manifest::parse(xml, Path::new("/data/regions/materials.xml")).unwrap();

        let names: Vec<_> = manifest.entries.iter().map(|e| e.path.clone()).collect();
        assert_eq!(
            names,
            vec![
                PathBuf::from("/data/regions/a.xml"),
                PathBuf::from("/data/regions/b.xml"),
                PathBuf::from("/data/regions/c.xml"),
            ]
        );
        let priorities: Vec<_> = manifest.entries.iter().map(|e| e.priority).collect();
        assert_eq!(priorities, vec![0, 1, 2]);
        assert_eq!(manifest.entries[1].include, "Materials/regions/b.xml");
    }

    #[test]
    fn test_duplicates_are_kept() {
        let xml = r#"<m><region include="a.xml"/><region include="x/a.xml"/></m>"#;
        let manifest = Manifest::parse(xml, Path::new("materials.xml")).unwrap();
        assert_eq!(manifest.entries.len(), 2);
        assert_eq!(manifest.entries[0].path, manifest.entries[1].path);
    }

    #[test]
    fn test_resolve_without_material() {
        let dir = tempdir().unwrap();
        let manifest = write(
            dir.path(),
            "materials.xml",
            r#"<m><region include="a.xml"/><region include="b.xml"/></m>"#,
        );
        // Unfiltered resolution never opens the region files.
        let files = resolve(&manifest, None).unwrap();
        assert_eq!(files, vec![dir.path().join("a.xml"), dir.path().join("b.xml")]);
    }

    #[test]
    fn test_resolve_filters_by_material() {
        let dir = tempdir().unwrap();
        let manifest = write(
            dir.path(),
            "materials.xml",
            r#"<m><region include="a.xml"/><region include="b.xml"/>
               <material><name>Forest</name></material></m>"#,
        );
        write(dir.path(), "a.xml", &region_with_material("Grassland"));
        write(dir.path(), "b.xml", &region_with_material("Forest"));

        let files = resolve(&manifest, Some("Forest")).unwrap();
        assert_eq!(files, vec![dir.path().join("b.xml")]);
    }

    #[test]
    fn test_material_match_is_exact_and_case_sensitive() {
        let path = Path::new("r.xml");
        let xml = "<r><material><name>DeciduousForest</name><name>Forest2</name></material></r>";
        assert!(!defines_material(xml, path, "Forest").unwrap());
        assert!(!defines_material(xml, path, "deciduousforest").unwrap());
        assert!(defines_material(xml, path, "Forest2").unwrap());
    }

    #[test]
    fn test_padded_material_name_does_not_match() {
        let xml = "<r><material><name> Forest </name></material></r>";
        assert!(!defines_material(xml, Path::new("r.xml"), "Forest").unwrap());
        assert!(defines_material(xml, Path::new("r.xml"), " Forest ").unwrap());
    }

    #[test]
    fn test_every_include_yields_an_entry() {
        let xml = r#"<m><region include="a.xml"/><region include=""/><region include="sub/.."/><region/></m>"#;
        let manifest = Manifest::parse(xml, Path::new("/data/regions/materials.xml")).unwrap();

        assert_eq!(manifest.entries.len(), 3);
        assert_eq!(manifest.entries[1].path, PathBuf::from("/data/regions/"));
        assert_eq!(manifest.entries[2].path, PathBuf::from("/data/regions/.."));
    }

    #[test]
    fn test_unreadable_include_fails_material_scan() {
        let dir = tempdir().unwrap();
        let manifest = write(dir.path(), "materials.xml", r#"<m><region include=""/></m>"#);
        assert_eq!(resolve(&manifest, None).unwrap().len(), 1);
        assert!(matches!(resolve(&manifest, Some("Forest")), Err(ParseError::Io { .. })));
    }

    #[test]
    fn test_filtered_is_ordered_subset() {
        let dir = tempdir().unwrap();
        let manifest = write(
            dir.path(),
            "materials.xml",
            r#"<m><region include="c.xml"/><region include="a.xml"/><region include="b.xml"/></m>"#,
        );
        write(dir.path(), "a.xml", &region_with_material("Sand"));
        write(dir.path(), "b.xml", &region_with_material("Sand"));
        write(dir.path(), "c.xml", &region_with_material("Sand"));

        let all = resolve(&manifest, None).unwrap();
        let sand = resolve(&manifest, Some("Sand")).unwrap();
        assert_eq!(all, sand);
    }

    #[test]
    fn test_broken_candidate_propagates() {
        let dir = tempdir().unwrap();
        let manifest = write(
            dir.path(),
            "materials.xml",
            r#"<m><region include="a.xml"/><region include="missing.xml"/></m>"#,
        );
        write(dir.path(), "a.xml", &region_with_material("Forest"));

        assert!(matches!(
            resolve(&manifest, Some("Forest")),
            Err(ParseError::Io { .. })
        ));
    }

    #[test]
    fn test_malformed_manifest_propagates() {
        let dir = tempdir().unwrap();
        let manifest = write(dir.path(), "materials.xml", "<m><region include='a.xml'>");
        assert!(matches!(resolve(&manifest, None), Err(ParseError::Xml { .. })));
    }
}
