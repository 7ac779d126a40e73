use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use cadastro_core::reference::{ReferenceModel, ThemeDescriptor, ThemeGroup};
use cadastro_core::traits::{LayerPayload, LayerWriter};
use cadastro_core::types::{Feature, GeometryKind};
use cadastro_core::{Error, Result};
use cadastro_geometry::{esri_wkt, NormalizedLayer};
use cadastro_style::{derive_style, write_style};
use geo::{Coord, Geometry, LineString};
use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use shapefile::{Multipoint, PolygonRing, Polyline};
use tracing::{debug, warn};

const BASE_COLUMNS: [&str; 3] = ["recibo", "area", "tema"];
const BOUNDARY_COLUMNS: [&str; 3] = ["modfiscais", "municipio", "estado"];
const BOUNDARY_OUTPUTS: [&str; 2] = ["Area_do_Imovel", "Area_Liquida"];
const CHARACTER_WIDTH: u8 = 254;
const DBF_NAME_LIMIT: usize = 10;

/// Projected attribute schema for a theme: receipt, area and theme label,
/// plus fiscal-module count, municipality and state for property-boundary
/// outputs. Only columns present on at least one record are kept.
pub fn project_columns(output_name: &str, features: &[Feature]) -> Vec<String> {
    let mut wanted: Vec<&str> = BASE_COLUMNS.to_vec();
    if BOUNDARY_OUTPUTS.iter().any(|b| output_name.contains(b)) {
        wanted.extend(BOUNDARY_COLUMNS);
    }
    wanted
        .into_iter()
        .filter(|column| features.iter().any(|f| f.attributes.contains_key(*column)))
        .map(str::to_string)
        .collect()
}

/// One theme on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct WrittenTheme {
    pub path: PathBuf,
    pub features: usize,
    pub kind: GeometryKind,
    pub style: Option<PathBuf>,
    /// Records dropped for not matching the layer's geometry family.
    pub discarded: usize,
}

/// Lays themes out as `{root}/{order}-{group}/{output_name}.*`.
pub struct OutputWriter<'a, W> {
    root: PathBuf,
    model: &'a ReferenceModel,
    writer: W,
    styles: bool,
}

impl<'a, W: LayerWriter> OutputWriter<'a, W> {
    pub fn new(root: impl Into<PathBuf>, model: &'a ReferenceModel, writer: W, styles: bool) -> Self {
        Self { root: root.into(), model, writer, styles }
    }

    pub fn folder_for(&self, group: &ThemeGroup) -> PathBuf {
        self.root.join(self.model.folder_name(group))
    }

    /// Writes a normalized theme and, when enabled, its style document.
    ///
    /// The written geometry family is the first record's; records of any
    /// other family are dropped. The style is derived from that family, not
    /// from the declared one.
    pub fn write_theme(&self, group: &ThemeGroup, descriptor: &ThemeDescriptor, layer: NormalizedLayer) -> Result<WrittenTheme> {
        let kind = layer.actual_kind().ok_or_else(|| Error::EmptyAfterCleanup(descriptor.output_name.to_string()))?;
        let epsg = layer.epsg;
        let before = layer.features.len();
        let features: Vec<Feature> = layer.features.into_iter().filter(|f| f.kind() == Some(kind)).collect();
        let discarded = before - features.len();
        if discarded > 0 {
            warn!(theme = descriptor.output_name, kept = %kind, discarded, "mixed geometry families; minority records dropped");
        }

        let columns = project_columns(descriptor.output_name, &features);
        let folder = self.folder_for(group);
        fs::create_dir_all(&folder)?;
        let stem = folder.join(descriptor.output_name);
        let payload = LayerPayload { columns: &columns, features: &features, kind, epsg };
        let path = self.writer.write_layer(&stem, &payload)?;

        let style = if self.styles {
            let style = derive_style(self.model, descriptor, Some(kind));
            Some(write_style(&path, &style)?)
        } else {
            None
        };
        debug!(theme = descriptor.output_name, path = %path.display(), count = features.len(), %kind, "theme written");
        Ok(WrittenTheme { path, features: features.len(), kind, style, discarded })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnType {
    Numeric,
    Character,
}

/// All-numeric columns (ignoring nulls) become numeric(19,8).
fn column_type(column: &str, features: &[Feature]) -> ColumnType {
    let mut values = features.iter().filter_map(|f| f.attribute(column)).filter(|v| !v.is_null()).peekable();
    if values.peek().is_some() && values.all(|v| v.is_numeric()) {
        ColumnType::Numeric
    } else {
        ColumnType::Character
    }
}

enum ShapeBatch {
    Points(Vec<shapefile::Point>),
    Multipoints(Vec<Multipoint>),
    Polylines(Vec<Polyline>),
    Polygons(Vec<shapefile::Polygon>),
}

impl ShapeBatch {
    fn build(kind: GeometryKind, features: &[Feature]) -> Result<Self> {
        let geometries: Vec<&Geometry<f64>> = features
            .iter()
            .map(|f| f.geometry.as_ref().ok_or_else(|| Error::Shapefile("record without geometry".into())))
            .collect::<Result<_>>()?;
        Ok(match kind {
            GeometryKind::Point if geometries.iter().any(|g| matches!(g, Geometry::MultiPoint(_))) => {
                ShapeBatch::Multipoints(geometries.iter().map(|g| to_points(g).map(Multipoint::new)).collect::<Result<_>>()?)
            }
            GeometryKind::Point => ShapeBatch::Points(
                geometries
                    .iter()
                    .map(|g| to_points(g).and_then(|p| p.into_iter().next().ok_or_else(|| mismatch(kind, g))))
                    .collect::<Result<_>>()?,
            ),
            GeometryKind::Line => ShapeBatch::Polylines(geometries.iter().map(|g| to_parts(g).map(Polyline::with_parts)).collect::<Result<_>>()?),
            GeometryKind::Polygon => {
                ShapeBatch::Polygons(geometries.iter().map(|g| to_rings(g).map(shapefile::Polygon::with_rings)).collect::<Result<_>>()?)
            }
        })
    }
}

fn mismatch(kind: GeometryKind, geometry: &Geometry<f64>) -> Error {
    Error::Shapefile(format!("{kind} layer cannot hold {:?}", GeometryKind::of(geometry)))
}

fn sp(c: Coord<f64>) -> shapefile::Point {
    shapefile::Point::new(c.x, c.y)
}

fn ring(line: &LineString<f64>) -> Vec<shapefile::Point> {
    line.coords().copied().map(sp).collect()
}

fn to_points(g: &Geometry<f64>) -> Result<Vec<shapefile::Point>> {
    match g {
        Geometry::Point(p) => Ok(vec![sp(p.0)]),
        Geometry::MultiPoint(mp) => Ok(mp.iter().map(|p| sp(p.0)).collect()),
        other => Err(mismatch(GeometryKind::Point, other)),
    }
}

fn to_parts(g: &Geometry<f64>) -> Result<Vec<Vec<shapefile::Point>>> {
    let parts: Vec<Vec<shapefile::Point>> = match g {
        Geometry::Line(l) => vec![vec![sp(l.start), sp(l.end)]],
        Geometry::LineString(ls) => vec![ring(ls)],
        Geometry::MultiLineString(mls) => mls.iter().map(ring).collect(),
        other => return Err(mismatch(GeometryKind::Line, other)),
    };
    Ok(parts.into_iter().filter(|p| p.len() >= 2).collect())
}

fn to_rings(g: &Geometry<f64>) -> Result<Vec<PolygonRing<shapefile::Point>>> {
    let polygons = match g {
        Geometry::Polygon(p) => vec![p.clone()],
        Geometry::MultiPolygon(mp) => mp.0.clone(),
        Geometry::Rect(r) => vec![r.to_polygon()],
        Geometry::Triangle(t) => vec![t.to_polygon()],
        other => return Err(mismatch(GeometryKind::Polygon, other)),
    };
    let mut rings = Vec::new();
    for polygon in &polygons {
        rings.push(PolygonRing::Outer(ring(polygon.exterior())));
        rings.extend(polygon.interiors().iter().map(|i| PolygonRing::Inner(ring(i))));
    }
    Ok(rings)
}

/// Writes `.shp/.shx/.dbf` through the `shapefile` crate plus `.prj` and a
/// UTF-8 `.cpg`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapefileWriter;

impl ShapefileWriter {
    pub fn new() -> Self { Self }
}

impl LayerWriter for ShapefileWriter {
    fn write_layer(&self, stem: &Path, layer: &LayerPayload<'_>) -> Result<PathBuf> {
        let shp = with_suffix(stem, "shp");
        let shp_err = |e: shapefile::Error| Error::Shapefile(format!("{}: {e}", shp.display()));

        let mut table = TableWriterBuilder::new();
        let mut fields: Vec<(String, &str, ColumnType)> = Vec::with_capacity(layer.columns.len());
        for column in layer.columns {
            let field: String = column.chars().take(DBF_NAME_LIMIT).collect();
            let name = FieldName::try_from(field.as_str()).map_err(|e| Error::Shapefile(format!("field '{column}': {e:?}")))?;
            let ty = column_type(column, layer.features);
            table = match ty {
                ColumnType::Numeric => table.add_numeric_field(name, 19, 8),
                ColumnType::Character => table.add_character_field(name, CHARACTER_WIDTH),
            };
            fields.push((field, column.as_str(), ty));
        }

        let records: Vec<Record> = layer
            .features
            .iter()
            .map(|feature| {
                let mut record = Record::default();
                for (field, column, ty) in &fields {
                    let value = feature.attribute(column);
                    let cell = match ty {
                        ColumnType::Numeric => FieldValue::Numeric(value.and_then(|v| v.as_f64())),
                        ColumnType::Character => {
                            FieldValue::Character(value.and_then(|v| v.to_label()).map(|s| fit(&s, usize::from(CHARACTER_WIDTH))))
                        }
                    };
                    record.insert(field.clone(), cell);
                }
                record
            })
            .collect();

        let batch = ShapeBatch::build(layer.kind, layer.features)?;
        {
            let mut writer = shapefile::Writer::from_path(&shp, table).map_err(shp_err)?;
            match &batch {
                ShapeBatch::Points(shapes) => {
                    for (shape, record) in shapes.iter().zip(&records) {
                        writer.write_shape_and_record(shape, record).map_err(shp_err)?;
                    }
                }
                ShapeBatch::Multipoints(shapes) => {
                    for (shape, record) in shapes.iter().zip(&records) {
                        writer.write_shape_and_record(shape, record).map_err(shp_err)?;
                    }
                }
                ShapeBatch::Polylines(shapes) => {
                    for (shape, record) in shapes.iter().zip(&records) {
                        writer.write_shape_and_record(shape, record).map_err(shp_err)?;
                    }
                }
                ShapeBatch::Polygons(shapes) => {
                    for (shape, record) in shapes.iter().zip(&records) {
                        writer.write_shape_and_record(shape, record).map_err(shp_err)?;
                    }
                }
            }
        }

        match esri_wkt(layer.epsg) {
            Some(wkt) => fs::write(with_suffix(stem, "prj"), wkt)?,
            None => warn!(layer = %shp.display(), epsg = layer.epsg, "no WKT for target CRS; .prj not written"),
        }
        fs::write(with_suffix(stem, "cpg"), "UTF-8")?;
        Ok(shp)
    }
}

/// `stem` + `.ext`, without touching dots already in the stem.
pub(crate) fn with_suffix(stem: &Path, ext: &str) -> PathBuf {
    let mut s = OsString::from(stem.as_os_str());
    s.push(".");
    s.push(ext);
    PathBuf::from(s)
}

/// Truncates to at most `max` UTF-8 bytes on a char boundary.
fn fit(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadastro_core::types::{AttributeValue, Attributes};
    use geo::point;

    fn feature(pairs: &[(&str, AttributeValue)]) -> Feature {
        let attrs: Attributes = pairs.iter().map(|(k, v)| ((*k).to_string(), v.clone())).collect();
        Feature::new(Some(Geometry::Point(point!(x: 0.0, y: 0.0))), attrs)
    }

    #[test]
    fn boundary_outputs_keep_municipality_when_present() {
        let features = vec![
            feature(&[("tema", AttributeValue::Text("Área do Imovel".into())), ("municipio", AttributeValue::Text("Cuiabá".into()))]),
            feature(&[("tema", AttributeValue::Text("Área do Imovel".into())), ("recibo", AttributeValue::Text("MT-1".into())), ("cod", AttributeValue::Integer(1))]),
        ];
        assert_eq!(project_columns("Area_do_Imovel", &features), vec!["recibo", "tema", "municipio"]);
        assert_eq!(project_columns("Area_Liquida_do_Imovel", &features), vec!["recibo", "tema", "municipio"]);
        assert_eq!(project_columns("Banhado", &features), vec!["recibo", "tema"]);
    }

    #[test]
    fn numeric_columns_need_only_numbers() {
        let features = vec![feature(&[("area", AttributeValue::Number(1.5))]), feature(&[("area", AttributeValue::Null)])];
        assert_eq!(column_type("area", &features), ColumnType::Numeric);
        let mixed = vec![feature(&[("area", AttributeValue::Number(1.5))]), feature(&[("area", AttributeValue::Text("x".into()))])];
        assert_eq!(column_type("area", &mixed), ColumnType::Character);
        assert_eq!(column_type("missing", &features), ColumnType::Character);
    }

    #[test]
    fn suffix_keeps_dots_in_stems() {
        assert_eq!(with_suffix(Path::new("/o/Reservatorio_1.800"), "shp"), PathBuf::from("/o/Reservatorio_1.800.shp"));
        assert_eq!(fit("ação", 2), "a");
    }
}
