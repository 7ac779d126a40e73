//! Domain types shared by the resolver, classifier, normalizer and writer.

use geo::Geometry;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::reference::{ThemeDescriptor, ThemeGroup};

/// Coarse geometry family used for declared kinds and symbol selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeometryKind {
    Point,
    Line,
    Polygon,
}

impl GeometryKind {
    pub fn of(geometry: &Geometry<f64>) -> Option<Self> {
        match geometry {
            Geometry::Point(_) | Geometry::MultiPoint(_) => Some(Self::Point),
            Geometry::Line(_) | Geometry::LineString(_) | Geometry::MultiLineString(_) => Some(Self::Line),
            Geometry::Polygon(_) | Geometry::MultiPolygon(_) | Geometry::Rect(_) | Geometry::Triangle(_) => {
                Some(Self::Polygon)
            }
            Geometry::GeometryCollection(_) => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Point => "Point",
            Self::Line => "Line",
            Self::Polygon => "Polygon",
        }
    }
}

impl fmt::Display for GeometryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single attribute cell read from (or written to) a dBase table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Text(String),
    Number(f64),
    Integer(i64),
    Boolean(bool),
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(n) => Some(*n),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Number(_) | Self::Integer(_))
    }

    /// Text rendering used for labels and character columns; `None` for nulls
    /// and blank strings.
    pub fn to_label(&self) -> Option<String> {
        let s = match self {
            Self::Null => return None,
            Self::Text(s) => s.trim().to_string(),
            Self::Number(n) => n.to_string(),
            Self::Integer(i) => i.to_string(),
            Self::Boolean(b) => b.to_string(),
        };
        if s.is_empty() { None } else { Some(s) }
    }
}

/// Attribute names are stored lowercased.
pub type Attributes = BTreeMap<String, AttributeValue>;

#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    /// `None` for null shapes.
    pub geometry: Option<Geometry<f64>>,
    pub attributes: Attributes,
}

impl Feature {
    pub fn new(geometry: Option<Geometry<f64>>, attributes: Attributes) -> Self {
        Self { geometry, attributes }
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(&name.to_lowercase())
    }

    pub fn kind(&self) -> Option<GeometryKind> {
        self.geometry.as_ref().and_then(GeometryKind::of)
    }
}

/// Coordinate reference system attached to a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Crs {
    Epsg(u32),
    /// No EPSG code, but the `.prj` converts to a PROJ definition.
    Definition { name: String, proj: String },
    /// A `.prj` was present but could not be mapped to anything usable.
    Unrecognized(String),
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Definition { name, proj } => write!(f, "{name} ({proj})"),
            Crs::Unrecognized(name) => write!(f, "unrecognized CRS ({name})"),
        }
    }
}

/// Ordered features sharing one CRS. `crs == None` means unspecified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub crs: Option<Crs>,
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new(crs: Option<Crs>, features: Vec<Feature>) -> Self {
        Self { crs, features }
    }

    pub fn len(&self) -> usize { self.features.len() }

    pub fn is_empty(&self) -> bool { self.features.is_empty() }

    /// Union of attribute names present on any feature.
    pub fn columns(&self) -> BTreeSet<String> {
        self.features.iter().flat_map(|f| f.attributes.keys().cloned()).collect()
    }
}

/// Where one recognized raw layer lives and how to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceLayerHandle {
    /// A `.shp` file on disk with its siblings next to it.
    Standalone { path: PathBuf },
    /// A single-layer zip archive on disk.
    Archived { archive: PathBuf },
    /// A single-layer zip stored as an entry of an outer zip.
    Nested { outer: PathBuf, inner_entry: String },
}

impl SourceLayerHandle {
    pub fn container(&self) -> &Path {
        match self {
            Self::Standalone { path } => path,
            Self::Archived { archive } => archive,
            Self::Nested { outer, .. } => outer,
        }
    }
}

impl fmt::Display for SourceLayerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standalone { path } => write!(f, "{}", path.display()),
            Self::Archived { archive } => write!(f, "{}", archive.display()),
            Self::Nested { outer, inner_entry } => write!(f, "{}!{}", outer.display(), inner_entry),
        }
    }
}

/// Per-theme accumulator filled during classification and consumed once by
/// normalization.
#[derive(Debug, Clone)]
pub struct ThemeBucket {
    pub group: &'static ThemeGroup,
    pub descriptor: &'static ThemeDescriptor,
    collections: Vec<FeatureCollection>,
}

impl ThemeBucket {
    pub fn new(group: &'static ThemeGroup, descriptor: &'static ThemeDescriptor) -> Self {
        Self { group, descriptor, collections: Vec::new() }
    }

    pub fn push(&mut self, collection: FeatureCollection) {
        self.collections.push(collection);
    }

    pub fn collections(&self) -> &[FeatureCollection] { &self.collections }

    pub fn feature_count(&self) -> usize {
        self.collections.iter().map(FeatureCollection::len).sum()
    }

    pub fn into_collections(self) -> Vec<FeatureCollection> { self.collections }
}

/// Outcome of one pipeline run, handed to the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessingResult {
    pub receipt: String,
    pub themes_written: usize,
    pub feature_total: usize,
    pub generated: Vec<PathBuf>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub output_dir: Option<PathBuf>,
}

impl ProcessingResult {
    pub fn new(receipt: impl Into<String>) -> Self {
        Self { receipt: receipt.into(), ..Self::default() }
    }

    pub fn record_written(&mut self, path: PathBuf, features: usize) {
        self.themes_written += 1;
        self.feature_total += features;
        self.generated.push(path);
    }

    pub fn record_error(&mut self, output_name: &str, message: impl fmt::Display) {
        self.errors.push(format!("{output_name}: {message}"));
    }

    pub fn succeeded(&self) -> bool { self.themes_written > 0 }

    /// Rewrites generated paths relative to `root` (used once the output
    /// directory itself is about to disappear into an archive).
    pub fn relativize(&mut self, root: &Path) {
        for path in &mut self.generated {
            if let Ok(rel) = path.strip_prefix(root) {
                *path = rel.to_path_buf();
            }
        }
        self.output_dir = None;
    }
}
