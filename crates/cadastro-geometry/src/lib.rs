//! cadastro-geometry
//!
//! CRS detection from `.prj` text, reprojection through `proj4rs` (bundled
//! EPSG definitions, `.prj` WKT converted by `proj4wkt`), and the
//! per-theme normalizer (CRS reconciliation, multipoint explosion, emptiness
//! cleanup).

pub mod crs;
pub mod normalize;
pub mod reproject;

pub use crs::{crs_from_prj, detect_epsg, esri_wkt, is_tabulated, proj_definition};
pub use normalize::{explode_multipoints, NormalizedLayer, Normalizer};
pub use reproject::{is_supported, Reprojector};
