use cadastro_core::reference::{ReferenceModel, ThemeDescriptor};
use cadastro_core::types::GeometryKind;
use serde::Serialize;
use tracing::debug;

pub const POLYGON_FILL_OPACITY: f64 = 0.7;
pub const POLYGON_STROKE_WIDTH: f64 = 0.8;
pub const POINT_STROKE_WIDTH: f64 = 1.5;
pub const POINT_SIZE: u32 = 3;

/// Which row of the declared-vs-actual table produced a style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StyleCase {
    /// Declared polygon, written polygon.
    PolygonAsDeclared,
    /// Declared point, written point.
    PointAsDeclared,
    /// Declared polygon, written point, marker variant found.
    PointFromMarker,
    /// Declared polygon, written point, no marker variant.
    PointWithDeclaredColors,
    /// Declared point, written polygon.
    PolygonWithDeclaredColors,
    /// Written kind unknown or a line: declared kind and colors.
    DeclaredKindFallback,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StyleDescriptor {
    pub layer_name: String,
    /// Symbolizer family; only `Point` and `Polygon` are rendered.
    pub kind: GeometryKind,
    /// `None` renders an outline-only polygon.
    pub fill: Option<String>,
    pub outline: String,
    pub fill_opacity: f64,
    pub stroke_width: f64,
    pub point_size: u32,
    pub case: StyleCase,
}

impl StyleDescriptor {
    fn new(layer_name: &str, kind: GeometryKind, fill: Option<&str>, outline: &str, case: StyleCase) -> Self {
        let kind = if kind == GeometryKind::Point { GeometryKind::Point } else { GeometryKind::Polygon };
        let stroke_width = if kind == GeometryKind::Point { POINT_STROKE_WIDTH } else { POLYGON_STROKE_WIDTH };
        Self {
            layer_name: layer_name.to_string(),
            kind,
            fill: fill.map(str::to_string),
            outline: outline.to_string(),
            fill_opacity: POLYGON_FILL_OPACITY,
            stroke_width,
            point_size: POINT_SIZE,
            case,
        }
    }

    /// Colors for an equivalent descriptor taken straight from the model.
    pub fn from_descriptor(descriptor: &ThemeDescriptor) -> Self {
        let case = if descriptor.kind == GeometryKind::Point { StyleCase::PointAsDeclared } else { StyleCase::PolygonAsDeclared };
        Self::new(descriptor.output_name, descriptor.kind, descriptor.fill, descriptor.outline, case)
    }
}

/// Picks symbolizer and colors from the declared descriptor and the kind
/// actually written.
///
/// | declared | actual  | result                                   |
/// |----------|---------|------------------------------------------|
/// | Polygon  | Polygon | polygon, declared colors                 |
/// | Point    | Point   | point, declared colors                   |
/// | Polygon  | Point   | point, marker colors if the model has one |
/// | Point    | Polygon | polygon, declared colors                 |
/// | any      | other   | declared kind, declared colors           |
pub fn derive_style(model: &ReferenceModel, descriptor: &ThemeDescriptor, actual: Option<GeometryKind>) -> StyleDescriptor {
    let name = descriptor.output_name;
    let declared = descriptor.kind;
    let style = match (declared, actual) {
        (GeometryKind::Polygon, Some(GeometryKind::Polygon)) => {
            StyleDescriptor::new(name, GeometryKind::Polygon, descriptor.fill, descriptor.outline, StyleCase::PolygonAsDeclared)
        }
        (GeometryKind::Point, Some(GeometryKind::Point)) => {
            StyleDescriptor::new(name, GeometryKind::Point, descriptor.fill, descriptor.outline, StyleCase::PointAsDeclared)
        }
        (GeometryKind::Polygon, Some(GeometryKind::Point)) => match model.lookup_marker(descriptor.label) {
            Some(marker) => StyleDescriptor::new(
                name,
                GeometryKind::Point,
                marker.descriptor.fill,
                marker.descriptor.outline,
                StyleCase::PointFromMarker,
            ),
            None => StyleDescriptor::new(name, GeometryKind::Point, descriptor.fill, descriptor.outline, StyleCase::PointWithDeclaredColors),
        },
        (GeometryKind::Point, Some(GeometryKind::Polygon)) => {
            StyleDescriptor::new(name, GeometryKind::Polygon, descriptor.fill, descriptor.outline, StyleCase::PolygonWithDeclaredColors)
        }
        _ => StyleDescriptor::new(name, declared, descriptor.fill, descriptor.outline, StyleCase::DeclaredKindFallback),
    };
    debug!(layer = name, declared = %declared, actual = ?actual, case = ?style.case, "style derived");
    style
}

#[cfg(test)]
mod tests {
    use super::*;

    const NASCENTES: &str = "Área de Preservação Permanente de Nascentes ou Olhos D'água Perenes";

    fn entry(label: &str) -> &'static ThemeDescriptor {
        ReferenceModel::standard().lookup(label).expect("modelled").descriptor
    }

    #[test]
    fn polygon_theme_written_as_points_takes_marker_colors() {
        let model = ReferenceModel::standard();
        let base = entry(NASCENTES);
        let marker = model.lookup_marker(NASCENTES).expect("marker").descriptor;
        let style = derive_style(model, base, Some(GeometryKind::Point));
        assert_eq!(style.case, StyleCase::PointFromMarker);
        assert_eq!(style.kind, GeometryKind::Point);
        assert_eq!(style.outline, marker.outline);
        assert_eq!(style.fill.as_deref(), marker.fill);
        assert_eq!(style.layer_name, base.output_name);
        assert_eq!(style.stroke_width, POINT_STROKE_WIDTH);
    }

    #[test]
    fn polygon_theme_written_as_points_without_marker_keeps_its_colors() {
        let base = entry("Banhado");
        let style = derive_style(ReferenceModel::standard(), base, Some(GeometryKind::Point));
        assert_eq!(style.case, StyleCase::PointWithDeclaredColors);
        assert_eq!((style.fill.as_deref(), style.outline.as_str()), (base.fill, base.outline));
    }

    #[test]
    fn matching_kinds_use_declared_styles() {
        let model = ReferenceModel::standard();
        let polygon = derive_style(model, entry("Banhado"), Some(GeometryKind::Polygon));
        assert_eq!((polygon.case, polygon.stroke_width), (StyleCase::PolygonAsDeclared, POLYGON_STROKE_WIDTH));
        let point = derive_style(model, entry("Sede ou Ponto de Referência do Imóvel"), Some(GeometryKind::Point));
        assert_eq!(point.case, StyleCase::PointAsDeclared);
    }

    #[test]
    fn lines_and_unknown_kinds_fall_back_to_declared() {
        let model = ReferenceModel::standard();
        let line = derive_style(model, entry("Banhado"), Some(GeometryKind::Line));
        assert_eq!((line.case, line.kind), (StyleCase::DeclaredKindFallback, GeometryKind::Polygon));
        let unknown = derive_style(model, entry("Sede ou Ponto de Referência do Imóvel"), None);
        assert_eq!(unknown.kind, GeometryKind::Point);
    }
}
