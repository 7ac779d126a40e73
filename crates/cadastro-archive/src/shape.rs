//! Conversion of shapefile records into the engine's `geo` geometries and
//! attribute values.

use cadastro_core::types::AttributeValue;
use cadastro_core::{Error, Result};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPoint, MultiPolygon, Point, Polygon};
use shapefile::dbase::FieldValue;
use shapefile::{PolygonRing, Shape};

/// Anything with planar x/y; M and Z are dropped.
trait PlanarPoint {
    fn coord(&self) -> Coord<f64>;
}

impl PlanarPoint for shapefile::Point {
    fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

impl PlanarPoint for shapefile::PointM {
    fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

impl PlanarPoint for shapefile::PointZ {
    fn coord(&self) -> Coord<f64> { Coord { x: self.x, y: self.y } }
}

/// `Ok(None)` for null shapes; multipatch records are rejected.
pub fn to_geometry(shape: &Shape) -> Result<Option<Geometry<f64>>> {
    let geometry = match shape {
        Shape::NullShape => return Ok(None),
        Shape::Point(p) => point(p),
        Shape::PointM(p) => point(p),
        Shape::PointZ(p) => point(p),
        Shape::Multipoint(m) => multipoint(m.points()),
        Shape::MultipointM(m) => multipoint(m.points()),
        Shape::MultipointZ(m) => multipoint(m.points()),
        Shape::Polyline(l) => polyline(l.parts()),
        Shape::PolylineM(l) => polyline(l.parts()),
        Shape::PolylineZ(l) => polyline(l.parts()),
        Shape::Polygon(p) => polygon(p.rings()),
        Shape::PolygonM(p) => polygon(p.rings()),
        Shape::PolygonZ(p) => polygon(p.rings()),
        Shape::Multipatch(_) => return Err(Error::Shapefile("multipatch records are not supported".into())),
    };
    Ok(Some(geometry))
}

fn point<P: PlanarPoint>(p: &P) -> Geometry<f64> {
    Geometry::Point(Point::from(p.coord()))
}

fn multipoint<P: PlanarPoint>(points: &[P]) -> Geometry<f64> {
    Geometry::MultiPoint(MultiPoint(points.iter().map(|p| Point::from(p.coord())).collect()))
}

fn line<P: PlanarPoint>(points: &[P]) -> LineString<f64> {
    points.iter().map(PlanarPoint::coord).collect()
}

fn polyline<P: PlanarPoint>(parts: &[Vec<P>]) -> Geometry<f64> {
    match parts {
        [single] => Geometry::LineString(line(single)),
        _ => Geometry::MultiLineString(MultiLineString(parts.iter().map(|p| line(p)).collect())),
    }
}

/// Each outer ring opens a polygon; inner rings attach to the most recent
/// outer ring. An inner ring with no preceding outer is promoted to outer.
fn polygon<P: PlanarPoint>(rings: &[PolygonRing<P>]) -> Geometry<f64> {
    let mut polygons: Vec<Polygon<f64>> = Vec::new();
    for ring in rings {
        match ring {
            PolygonRing::Outer(points) => polygons.push(Polygon::new(line(points), vec![])),
            PolygonRing::Inner(points) => match polygons.last_mut() {
                Some(last) => last.interiors_push(line(points)),
                None => polygons.push(Polygon::new(line(points), vec![])),
            },
        }
    }
    if polygons.len() == 1 {
        if let Some(only) = polygons.pop() {
            return Geometry::Polygon(only);
        }
    }
    Geometry::MultiPolygon(MultiPolygon(polygons))
}

pub fn to_attribute(value: &FieldValue) -> AttributeValue {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => AttributeValue::Text(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => AttributeValue::Number(*n),
        FieldValue::Float(Some(n)) => AttributeValue::Number(f64::from(*n)),
        FieldValue::Double(n) | FieldValue::Currency(n) => AttributeValue::Number(*n),
        FieldValue::Integer(i) => AttributeValue::Integer(i64::from(*i)),
        FieldValue::Logical(Some(b)) => AttributeValue::Boolean(*b),
        FieldValue::Date(Some(d)) => AttributeValue::Text(format!("{:04}-{:02}-{:02}", d.year(), d.month(), d.day())),
        // Timestamps never appear in SICAR tables.
        _ => AttributeValue::Null,
    }
}
