//! cadastro-archive
//!
//! Finds the SICAR source layers inside whatever the caller handed over (an
//! archive of archives, a folder of archives, or a folder of loose
//! shapefiles) and reads them into `FeatureCollection`s. Every extraction
//! lives in a `TempDir` owned by the call that needed it.

pub mod catalogue;
#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod input;
pub mod reader;
pub mod resolver;
pub mod shape;

pub use catalogue::{has_required_columns, match_expected, EXPECTED_LAYERS, REQUIRED_COLUMNS};
pub use input::MaterializedInput;
pub use reader::{probe_columns, read_collection, ExtractedLayer, ShapefileReader};
pub use resolver::{classify_input, resolve, InputShape, LayerSet};
