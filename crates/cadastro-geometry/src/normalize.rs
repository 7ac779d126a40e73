use cadastro_core::types::{Crs, Feature, FeatureCollection, GeometryKind};
use cadastro_core::{Error, Result};
use geo::{Geometry, HasDimensions};
use tracing::debug;

use crate::reproject::Reprojector;

/// A theme's records after normalization: one CRS (the target), no empty
/// geometries, and one point per record for point themes.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedLayer {
    pub epsg: u32,
    pub features: Vec<Feature>,
    /// Multipoint records split into single points.
    pub exploded: usize,
    pub dropped_empty: usize,
    pub reprojected: usize,
}

impl NormalizedLayer {
    /// Geometry family of the first record; the written layer follows it.
    pub fn actual_kind(&self) -> Option<GeometryKind> {
        self.features.iter().find_map(Feature::kind)
    }

    pub fn len(&self) -> usize { self.features.len() }

    pub fn is_empty(&self) -> bool { self.features.is_empty() }
}

#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    target_epsg: u32,
}

impl Normalizer {
    pub fn new(target_epsg: u32) -> Self { Self { target_epsg } }

    pub fn target_epsg(&self) -> u32 { self.target_epsg }

    /// Merges `collections` into one layer in the target CRS.
    ///
    /// Each collection is reconciled on its own before concatenation: an
    /// unspecified CRS is assumed to already be the target, any other
    /// supported CRS is reprojected. `declared` selects multipoint explosion.
    /// Returns [`Error::EmptyAfterCleanup`] when no record survives.
    pub fn normalize(&self, label: &str, declared: GeometryKind, collections: Vec<FeatureCollection>) -> Result<NormalizedLayer> {
        let mut features = Vec::with_capacity(collections.iter().map(FeatureCollection::len).sum());
        let mut reprojected = 0;
        for collection in collections {
            let (moved, reconciled) = self.reconcile(label, collection)?;
            reprojected += moved;
            features.extend(reconciled);
        }

        let mut exploded = 0;
        if declared == GeometryKind::Point {
            let (split, parents) = explode_multipoints(features);
            features = split;
            exploded = parents;
        }

        let before = features.len();
        features.retain(|f| f.geometry.as_ref().is_some_and(|g| !g.is_empty()));
        let dropped_empty = before - features.len();

        debug!(theme = label, count = features.len(), exploded, dropped_empty, reprojected, "normalized theme");
        if features.is_empty() {
            return Err(Error::EmptyAfterCleanup(label.to_string()));
        }
        Ok(NormalizedLayer { epsg: self.target_epsg, features, exploded, dropped_empty, reprojected })
    }

    /// Brings one collection into the target CRS. Returns how many records
    /// were reprojected along with the records.
    fn reconcile(&self, label: &str, collection: FeatureCollection) -> Result<(usize, Vec<Feature>)> {
        let reprojector = match &collection.crs {
            None => return Ok((0, collection.features)),
            Some(Crs::Epsg(code)) if *code == self.target_epsg => return Ok((0, collection.features)),
            Some(Crs::Epsg(code)) => Reprojector::new(*code, self.target_epsg)?,
            Some(Crs::Definition { name, proj }) => Reprojector::from_definition(name, proj, self.target_epsg)?,
            Some(Crs::Unrecognized(name)) => {
                return Err(Error::Projection(format!("{label}: cannot reproject from unrecognized CRS {name}")));
            }
        };
        debug!(theme = label, from = reprojector.source(), to = self.target_epsg, count = collection.len(), "reprojecting collection");
        let mut moved = 0;
        let mut out = Vec::with_capacity(collection.len());
        for mut feature in collection.features {
            if let Some(geometry) = feature.geometry.take() {
                feature.geometry = Some(reprojector.transform(&geometry)?);
                moved += 1;
            }
            out.push(feature);
        }
        Ok((moved, out))
    }
}

/// Splits every multipoint record into one record per member point, each
/// carrying a copy of the parent's attributes. Returns the records and the
/// number of parents split.
pub fn explode_multipoints(features: Vec<Feature>) -> (Vec<Feature>, usize) {
    let mut parents = 0;
    let mut out = Vec::with_capacity(features.len());
    for feature in features {
        match feature.geometry {
            Some(Geometry::MultiPoint(multi)) => {
                parents += 1;
                for point in multi {
                    out.push(Feature::new(Some(Geometry::Point(point)), feature.attributes.clone()));
                }
            }
            geometry => out.push(Feature { geometry, ..feature }),
        }
    }
    (out, parents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastro_core::types::{AttributeValue, Attributes};
    use geo::{point, polygon, MultiPoint, Point};

    fn attrs(tema: &str) -> Attributes {
        let mut a = Attributes::new();
        a.insert("tema".into(), AttributeValue::Text(tema.into()));
        a.insert("area".into(), AttributeValue::Number(1.5));
        a
    }

    #[test]
    fn multipoint_with_k_members_becomes_k_records() {
        let multi = MultiPoint(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 2.0)]);
        let features = vec![Feature::new(Some(Geometry::MultiPoint(multi)), attrs("Sede"))];
        let (out, parents) = explode_multipoints(features);
        assert_eq!((out.len(), parents), (3, 1));
        assert!(out.iter().all(|f| f.attributes == attrs("Sede") && f.kind() == Some(GeometryKind::Point)));
    }

    #[test]
    fn polygon_themes_are_not_exploded() {
        let multi = Geometry::MultiPoint(MultiPoint(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]));
        let layer = Normalizer::new(4674)
            .normalize("Banhado", GeometryKind::Polygon, vec![FeatureCollection::new(None, vec![Feature::new(Some(multi), attrs("Banhado"))])])
            .expect("layer");
        assert_eq!((layer.len(), layer.exploded), (1, 0));
    }

    #[test]
    fn null_and_empty_geometries_are_dropped() {
        let square = polygon![(x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0)];
        let features = vec![
            Feature::new(None, attrs("Banhado")),
            Feature::new(Some(Geometry::MultiPoint(MultiPoint(vec![]))), attrs("Banhado")),
            Feature::new(Some(Geometry::Polygon(square)), attrs("Banhado")),
        ];
        let layer = Normalizer::new(4674)
            .normalize("Banhado", GeometryKind::Polygon, vec![FeatureCollection::new(Some(Crs::Epsg(4674)), features)])
            .expect("layer");
        assert_eq!((layer.len(), layer.dropped_empty), (1, 2));
    }

    #[test]
    fn nothing_left_is_reported_not_panicked() {
        let err = Normalizer::new(4674)
            .normalize("Banhado", GeometryKind::Polygon, vec![FeatureCollection::new(None, vec![Feature::new(None, attrs("Banhado"))])])
            .expect_err("empty");
        assert!(matches!(err, Error::EmptyAfterCleanup(ref l) if l == "Banhado"));
    }

    #[test]
    fn mixed_crs_inputs_end_up_in_the_target() {
        let utm = FeatureCollection::new(Some(Crs::Epsg(31983)), vec![Feature::new(Some(Geometry::Point(point!(x: 500_000.0, y: 8_000_000.0))), attrs("Sede"))]);
        let geo = FeatureCollection::new(Some(Crs::Epsg(4674)), vec![Feature::new(Some(Geometry::Point(point!(x: -45.0, y: -18.0))), attrs("Sede"))]);
        let unset = FeatureCollection::new(None, vec![Feature::new(Some(Geometry::Point(point!(x: -44.0, y: -18.0))), attrs("Sede"))]);
        let layer = Normalizer::new(4674).normalize("Sede", GeometryKind::Point, vec![utm, geo, unset]).expect("layer");
        assert_eq!((layer.epsg, layer.len(), layer.reprojected), (4674, 3, 1));
        let Some(Geometry::Point(p)) = &layer.features[0].geometry else { panic!("point expected") };
        assert!((p.x() + 45.0).abs() < 1e-6);
    }

    #[test]
    fn prj_definitions_without_a_code_are_reprojected() {
        let crs = Crs::Definition { name: "UTM 23S".into(), proj: "+proj=utm +zone=23 +south +ellps=GRS80 +units=m +no_defs".into() };
        let c = FeatureCollection::new(Some(crs), vec![Feature::new(Some(Geometry::Point(point!(x: 500_000.0, y: 8_000_000.0))), attrs("Sede"))]);
        let layer = Normalizer::new(4674).normalize("Sede", GeometryKind::Point, vec![c]).expect("layer");
        assert_eq!(layer.reprojected, 1);
        let Some(Geometry::Point(p)) = &layer.features[0].geometry else { panic!("point expected") };
        assert!((p.x() + 45.0).abs() < 1e-6);
    }

    #[test]
    fn unrecognized_crs_is_a_projection_error() {
        let c = FeatureCollection::new(Some(Crs::Unrecognized("Corrego Alegre".into())), vec![Feature::new(Some(Geometry::Point(point!(x: 1.0, y: 1.0))), attrs("Sede"))]);
        assert!(matches!(Normalizer::new(4674).normalize("Sede", GeometryKind::Point, vec![c]), Err(Error::Projection(_))));
    }
}
