use cadastro_core::reference::ReferenceModel;
use cadastro_core::types::GeometryKind;
use cadastro_style::{derive_style, style_for_output_name, write_style, StyleCase};
use tempfile::TempDir;

const NASCENTES: &str = "Área de Preservação Permanente de Nascentes ou Olhos D'água Perenes";

#[test]
fn style_lands_beside_the_layer_with_marker_colors() {
    let dir = TempDir::new().expect("tmp");
    let layer = dir.path().join("APP_Nascentes_ou_Olhos_Dagua_Perenes.shp");
    let model = ReferenceModel::standard();
    let descriptor = model.lookup(NASCENTES).expect("theme").descriptor;

    let style = derive_style(model, descriptor, Some(GeometryKind::Point));
    assert_eq!(style.case, StyleCase::PointFromMarker);
    let path = write_style(&layer, &style).expect("written");
    assert_eq!(path, dir.path().join("APP_Nascentes_ou_Olhos_Dagua_Perenes.sld"));

    let sld = std::fs::read_to_string(path).expect("read");
    assert!(sld.contains("#2892d3") && sld.contains("#1b5e8c"));
    assert!(sld.contains("<se:Name>APP_Nascentes_ou_Olhos_Dagua_Perenes</se:Name>"));
}

#[test]
fn every_output_name_has_a_declared_style() {
    let model = ReferenceModel::standard();
    for group in model.groups() {
        for theme in group.themes {
            let sld = style_for_output_name(model, theme.output_name).expect("style");
            assert!(sld.contains(theme.outline), "{}", theme.output_name);
        }
    }
    assert!(style_for_output_name(model, "Nao_Existe").is_none());
}
