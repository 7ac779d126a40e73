use cadastro_core::reference::{marker_label, ReferenceModel};
use cadastro_core::types::GeometryKind;
use cadastro_core::Error;

#[test]
fn every_modelled_label_resolves_to_its_own_group() {
    let model = ReferenceModel::standard();
    for group in model.groups() {
        for descriptor in group.themes {
            let entry = model.lookup(descriptor.label).expect("modelled label must resolve");
            assert_eq!(entry.group_key(), group.key);
            assert_eq!(entry.descriptor, descriptor);
        }
    }
}

#[test]
fn unknown_labels_are_not_found() {
    let model = ReferenceModel::standard();
    for label in ["", "Area do Imovel", "área do imovel", "Floresta Encantada", "APP Total "] {
        assert!(model.lookup(label).is_none(), "{label:?} should not resolve");
    }
}

#[test]
fn property_boundary_group_holds_polygon_and_point_themes() {
    let model = ReferenceModel::standard();
    let area = model.lookup("Área do Imovel").expect("area");
    let sede = model.lookup("Sede ou Ponto de Referência do Imóvel").expect("sede");
    assert_eq!(area.group_key(), "Area_do_Imovel");
    assert_eq!(sede.group_key(), "Area_do_Imovel");
    assert_eq!(area.descriptor.kind, GeometryKind::Polygon);
    assert_eq!(area.descriptor.fill, None);
    assert_eq!(sede.descriptor.kind, GeometryKind::Point);
}

#[test]
fn marker_variant_resolves_by_suffix_convention() {
    let model = ReferenceModel::standard();
    let label = "Área de Preservação Permanente de Nascentes ou Olhos D'água Perenes";
    assert_eq!(marker_label(label), format!("{label} - MARCADOR"));
    let marker = model.lookup_marker(label).expect("marker");
    assert_eq!(marker.descriptor.kind, GeometryKind::Point);
    assert_ne!(marker.descriptor.outline, model.lookup(label).expect("base").descriptor.outline);
    assert!(model.lookup_marker("Banhado").is_none());
}

#[test]
fn sorted_folder_names_reproduce_group_order() {
    let model = ReferenceModel::standard();
    let mut names: Vec<String> = model.groups().iter().rev().map(|g| model.folder_name(g)).collect();
    names.sort();
    let expected: Vec<String> = model.groups().iter().map(|g| model.folder_name(g)).collect();
    assert_eq!(names, expected);
    assert_eq!(names.last().map(String::as_str), Some("7-Resumo"));
}

#[test]
fn output_name_lookup_and_counts() {
    let model = ReferenceModel::standard();
    let entry = model.find_by_output_name("Reserva_Legal_Averbada").expect("entry");
    assert_eq!(entry.descriptor.label, "Reserva Legal Averbada");
    let counts = model.theme_counts();
    assert_eq!(counts.total, model.all_labels().len());
    assert_eq!(counts.per_group.first(), Some(&("Area_do_Imovel", 3)));
    assert_eq!(model.colors("Banhado"), Some((Some("#55b7b7"), "#55b7b7")));
}

#[test]
fn only_run_level_conditions_are_fatal() {
    assert!(Error::NoSourceLayers.is_fatal());
    assert!(Error::NoThemesRecognized { layers: 2 }.is_fatal());
    assert!(!Error::EmptyAfterCleanup("Banhado".into()).is_fatal());
    assert!(!Error::UnreadableLayer { layer: "x".into(), reason: "y".into() }.is_fatal());
}
