use std::fs;
use std::path::{Path, PathBuf};

use cadastro_core::reference::ReferenceModel;
use cadastro_core::types::GeometryKind;
use cadastro_core::Result;
use quick_xml::escape::escape;
use tracing::debug;

use crate::descriptor::StyleDescriptor;

pub const SLD_EXTENSION: &str = "sld";

const HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<StyledLayerDescriptor xmlns="http://www.opengis.net/sld" xmlns:se="http://www.opengis.net/se" version="1.1.0" xmlns:xlink="http://www.w3.org/1999/xlink" xmlns:ogc="http://www.opengis.net/ogc" xsi:schemaLocation="http://www.opengis.net/sld http://schemas.opengis.net/sld/1.1.0/StyledLayerDescriptor.xsd" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#;

/// SLD 1.1.0 document with a single rule, readable by QGIS and GeoServer.
pub fn render_sld(style: &StyleDescriptor) -> String {
    let name = escape(style.layer_name.as_str());
    let symbolizer = match style.kind {
        GeometryKind::Point => point_symbolizer(style),
        GeometryKind::Polygon | GeometryKind::Line => polygon_symbolizer(style),
    };
    format!(
        r#"{HEADER}
  <NamedLayer>
    <se:Name>{name}</se:Name>
    <UserStyle>
      <se:Name>{name}</se:Name>
      <se:FeatureTypeStyle>
        <se:Rule>
          <se:Name>Single symbol</se:Name>
{symbolizer}
        </se:Rule>
      </se:FeatureTypeStyle>
    </UserStyle>
  </NamedLayer>
</StyledLayerDescriptor>"#
    )
}

fn polygon_symbolizer(style: &StyleDescriptor) -> String {
    let fill = match &style.fill {
        Some(fill) => format!(
            r#"            <se:Fill>
              <se:SvgParameter name="fill">{}</se:SvgParameter>
              <se:SvgParameter name="fill-opacity">{}</se:SvgParameter>
            </se:Fill>"#,
            hex(fill),
            style.fill_opacity
        ),
        None => r#"            <se:Fill>
              <se:SvgParameter name="fill-opacity">0.0</se:SvgParameter>
            </se:Fill>"#
            .to_string(),
    };
    format!(
        r#"          <se:PolygonSymbolizer>
{fill}
            <se:Stroke>
              <se:SvgParameter name="stroke">{}</se:SvgParameter>
              <se:SvgParameter name="stroke-width">{}</se:SvgParameter>
            </se:Stroke>
          </se:PolygonSymbolizer>"#,
        hex(&style.outline),
        style.stroke_width
    )
}

/// Points without a fill are filled with their outline color.
fn point_symbolizer(style: &StyleDescriptor) -> String {
    let fill = style.fill.as_deref().unwrap_or(&style.outline);
    format!(
        r#"          <se:PointSymbolizer>
            <se:Graphic>
              <se:Mark>
                <se:WellKnownName>circle</se:WellKnownName>
                <se:Fill>
                  <se:SvgParameter name="fill">{}</se:SvgParameter>
                </se:Fill>
                <se:Stroke>
                  <se:SvgParameter name="stroke">{}</se:SvgParameter>
                  <se:SvgParameter name="stroke-width">{}</se:SvgParameter>
                </se:Stroke>
              </se:Mark>
              <se:Size>{}</se:Size>
            </se:Graphic>
          </se:PointSymbolizer>"#,
        hex(fill),
        hex(&style.outline),
        style.stroke_width,
        style.point_size
    )
}

/// Writes the document beside `layer_path`, same stem, `.sld` extension.
pub fn write_style(layer_path: &Path, style: &StyleDescriptor) -> Result<PathBuf> {
    let path = layer_path.with_extension(SLD_EXTENSION);
    fs::write(&path, render_sld(style))?;
    debug!(path = %path.display(), case = ?style.case, "style written");
    Ok(path)
}

/// Renders the declared style of the theme whose output name is `output_name`.
pub fn style_for_output_name(model: &ReferenceModel, output_name: &str) -> Option<String> {
    model.find_by_output_name(output_name).map(|entry| render_sld(&StyleDescriptor::from_descriptor(entry.descriptor)))
}

fn hex(color: &str) -> String {
    format!("#{}", escape(color.trim().trim_start_matches('#')))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{derive_style, StyleCase};

    #[test]
    fn outline_only_polygons_are_fully_transparent() {
        let model = ReferenceModel::standard();
        let descriptor = model.lookup("Área do Imovel").expect("theme").descriptor;
        let xml = render_sld(&derive_style(model, descriptor, Some(GeometryKind::Polygon)));
        assert!(xml.contains(r#"<se:SvgParameter name="fill-opacity">0.0</se:SvgParameter>"#));
        assert!(!xml.contains(r#"name="fill">"#));
        assert!(xml.contains(r#"<se:SvgParameter name="stroke-width">0.8</se:SvgParameter>"#));
        assert!(xml.contains("<se:Name>Area_do_Imovel</se:Name>"));
    }

    #[test]
    fn filled_polygons_use_seventy_percent_opacity() {
        let model = ReferenceModel::standard();
        let xml = style_for_output_name(model, "Banhado").expect("style");
        assert!(xml.contains(r##"<se:SvgParameter name="fill">#55b7b7</se:SvgParameter>"##));
        assert!(xml.contains(r#"<se:SvgParameter name="fill-opacity">0.7</se:SvgParameter>"#));
        assert!(style_for_output_name(model, "Nao_Existe").is_none());
    }

    #[test]
    fn points_render_a_circle_mark() {
        let model = ReferenceModel::standard();
        let descriptor = model.lookup("Sede ou Ponto de Referência do Imóvel").expect("theme").descriptor;
        let style = derive_style(model, descriptor, Some(GeometryKind::Point));
        assert_eq!(style.case, StyleCase::PointAsDeclared);
        let xml = render_sld(&style);
        assert!(xml.contains("<se:WellKnownName>circle</se:WellKnownName>"));
        assert!(xml.contains("<se:Size>3</se:Size>"));
        assert!(xml.contains(r#"<se:SvgParameter name="stroke-width">1.5</se:SvgParameter>"#));
    }

    #[test]
    fn layer_names_and_colors_are_escaped() {
        let model = ReferenceModel::standard();
        let descriptor = model.lookup("Banhado").expect("theme").descriptor;
        let style = StyleDescriptor {
            layer_name: "A & B <x>".into(),
            outline: "#a\"b".into(),
            ..derive_style(model, descriptor, Some(GeometryKind::Polygon))
        };
        let xml = render_sld(&style);
        assert!(xml.contains("<se:Name>A &amp; B &lt;x&gt;</se:Name>"));
        assert!(xml.contains("#a&quot;b"));
        assert!(!xml.contains("A & B"));
    }
}
