use cadastro_core::{Error, Result};
use geo::{Coord, Geometry, MapCoords};
use proj4rs::proj::Proj;

use crate::crs::proj_definition;

/// Point-wise transform from a source CRS into a target EPSG code.
pub struct Reprojector {
    source: String,
    target: String,
    from: Proj,
    to: Proj,
}

impl std::fmt::Debug for Reprojector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reprojector").field("source", &self.source).field("target", &self.target).finish()
    }
}

impl Reprojector {
    pub fn new(source: u32, target: u32) -> Result<Self> {
        Ok(Self { source: format!("EPSG:{source}"), target: format!("EPSG:{target}"), from: from_epsg(source)?, to: from_epsg(target)? })
    }

    /// Source given as a PROJ definition, e.g. one converted from a `.prj`.
    pub fn from_definition(name: &str, definition: &str, target: u32) -> Result<Self> {
        let from = Proj::from_proj_string(definition).map_err(|e| Error::Projection(format!("{name} ({definition}): {e}")))?;
        Ok(Self { source: name.to_string(), target: format!("EPSG:{target}"), from, to: from_epsg(target)? })
    }

    pub fn source(&self) -> &str { &self.source }

    pub fn target(&self) -> &str { &self.target }

    pub fn is_identity(&self) -> bool { self.source == self.target }

    pub fn transform_coord(&self, coord: Coord<f64>) -> Result<Coord<f64>> {
        if self.is_identity() {
            return Ok(coord);
        }
        let (x, y) = if self.from.is_latlong() { (coord.x.to_radians(), coord.y.to_radians()) } else { (coord.x, coord.y) };
        let mut point = (x, y, 0.0);
        proj4rs::transform::transform(&self.from, &self.to, &mut point).map_err(|e| {
            Error::Projection(format!("{} -> {} failed at ({}, {}): {e}", self.source, self.target, coord.x, coord.y))
        })?;
        let (x, y) = if self.to.is_latlong() { (point.0.to_degrees(), point.1.to_degrees()) } else { (point.0, point.1) };
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::Projection(format!(
                "{} -> {} produced a non-finite coordinate for ({}, {})",
                self.source, self.target, coord.x, coord.y
            )));
        }
        Ok(Coord { x, y })
    }

    pub fn transform(&self, geometry: &Geometry<f64>) -> Result<Geometry<f64>> {
        if self.is_identity() {
            return Ok(geometry.clone());
        }
        geometry.try_map_coords(|c| self.transform_coord(c))
    }
}

/// Whether `epsg` can be used as a reprojection source or target.
pub fn is_supported(epsg: u32) -> bool {
    from_epsg(epsg).is_ok()
}

/// The EPSG definitions bundled with `proj4rs` first, the built-in table
/// when a code is missing there or names a projection `proj4rs` lacks.
fn from_epsg(epsg: u32) -> Result<Proj> {
    if let Some(proj) = u16::try_from(epsg).ok().and_then(|code| Proj::from_epsg_code(code).ok()) {
        return Ok(proj);
    }
    let definition = proj_definition(epsg).ok_or_else(|| Error::Projection(format!("EPSG:{epsg} has no usable PROJ definition")))?;
    Proj::from_proj_string(&definition).map_err(|e| Error::Projection(format!("EPSG:{epsg} ({definition}): {e}")))
}
