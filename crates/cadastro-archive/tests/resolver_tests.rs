use anyhow::Result;
use cadastro_archive::fixtures::{self, Geom, Layer, Row, UTM_23S_PRJ};
use cadastro_archive::{resolve, ExtractedLayer, InputShape, ShapefileReader};
use cadastro_core::traits::LayerReader;
use cadastro_core::types::{Crs, GeometryKind, SourceLayerHandle};
use tempfile::TempDir;

const RECIBO: &str = "MT-5103403-0A1B2C3D4E5F";

fn sample_layers() -> Vec<Layer> {
    vec![
        Layer::new(
            "Area_do_Imovel",
            vec![
                Row::new(Geom::square(-56.0, -15.0, 0.01), "Área do Imovel", 120.5, RECIBO).with("municipio", "Cuiabá"),
                Row::new(Geom::Point(-55.995, -14.995), "Sede ou Ponto de Referência do Imóvel", 0.0, RECIBO),
            ],
        ),
        Layer::new("Reserva_Legal", vec![Row::new(Geom::square(-56.0, -15.0, 0.005), "Reserva Legal Proposta", 24.1, RECIBO)]),
        Layer::new(
            "MARCADORES_Area_de_Preservacao_Permanente",
            vec![Row::new(
                Geom::MultiPoint(vec![(-55.99, -14.99), (-55.98, -14.98)]),
                "Área de Preservação Permanente de Nascentes ou Olhos D'água Perenes",
                0.0,
                RECIBO,
            )],
        ),
        Layer::new("Hidrografia", vec![Row::new(Geom::square(0.0, 0.0, 1.0), "Rio", 0.0, RECIBO)]),
    ]
}

fn names(set: &cadastro_archive::LayerSet) -> Vec<&'static str> {
    let mut names: Vec<_> = set.layers.iter().map(|(n, _)| *n).collect();
    names.sort_unstable();
    names
}

#[test]
fn all_three_shapes_resolve_the_same_layers() -> Result<()> {
    let layers = sample_layers();

    let loose = TempDir::new()?;
    fixtures::write_loose(loose.path(), &layers)?;
    let folder = TempDir::new()?;
    fixtures::write_archive_folder(folder.path(), &layers)?;
    let nested_dir = TempDir::new()?;
    let nested = nested_dir.path().join("SHAPE_MT-5103403-0A1B2C3D4E5F.zip");
    fixtures::write_nested(&nested, &layers)?;

    let loose_set = resolve(loose.path())?;
    let folder_set = resolve(folder.path())?;
    let nested_set = resolve(&nested)?;

    assert!(matches!(loose_set.shape, InputShape::LooseFiles { .. }));
    assert!(matches!(folder_set.shape, InputShape::ArchiveFolder { .. }));
    assert!(matches!(nested_set.shape, InputShape::NestedArchive { .. }));

    let expected = vec!["Area_do_Imovel", "MARCADORES_Area_de_Preservacao_Permanente", "Reserva_Legal"];
    assert_eq!(names(&loose_set), expected);
    assert_eq!(names(&folder_set), expected);
    assert_eq!(names(&nested_set), expected);
    Ok(())
}

#[test]
fn nested_handles_read_mixed_records_and_clean_up() -> Result<()> {
    let dir = TempDir::new()?;
    let nested = dir.path().join("car.zip");
    fixtures::write_nested(&nested, &sample_layers())?;
    let set = resolve(&nested)?;
    let handle = set.get("Area_do_Imovel").expect("boundary layer");
    assert!(matches!(handle, SourceLayerHandle::Nested { .. }));

    let collection = ShapefileReader::new().read(handle)?;
    assert_eq!(collection.len(), 2);
    assert_eq!(collection.crs, Some(Crs::Epsg(4674)));
    let kinds: Vec<_> = collection.features.iter().map(|f| f.kind()).collect();
    assert_eq!(kinds, vec![Some(GeometryKind::Polygon), Some(GeometryKind::Point)]);
    let first = &collection.features[0];
    assert_eq!(first.attribute("tema").and_then(|v| v.as_text()), Some("Área do Imovel"));
    assert_eq!(first.attribute("municipio").and_then(|v| v.as_text()), Some("Cuiabá"));
    assert_eq!(first.attribute("area").and_then(|v| v.as_f64()), Some(120.5));

    let SourceLayerHandle::Nested { outer, inner_entry } = handle else { unreachable!() };
    let extracted = ExtractedLayer::open_nested(outer, inner_entry)?;
    let scratch = extracted.dir().to_path_buf();
    assert!(extracted.shp().is_file());
    assert!(extracted.shp().with_extension("dbf").is_file());
    drop(extracted);
    assert!(!scratch.exists(), "extraction dir left behind: {}", scratch.display());
    Ok(())
}

#[test]
fn layers_without_required_columns_are_skipped() -> Result<()> {
    let dir = TempDir::new()?;
    let layers = vec![
        Layer::new("Area_do_Imovel", vec![Row::new(Geom::square(0.0, 0.0, 1.0), "Área do Imovel", 1.0, RECIBO)]).without_recibo(),
        Layer::new("Cobertura_do_Solo", vec![Row::new(Geom::square(0.0, 0.0, 1.0), "Remanescente de Vegetação Nativa", 1.0, RECIBO)]),
    ];
    fixtures::write_archive_folder(dir.path(), &layers)?;
    let set = resolve(dir.path())?;
    assert_eq!(names(&set), vec!["Cobertura_do_Solo"]);
    Ok(())
}

#[test]
fn crs_comes_from_the_prj_sibling() -> Result<()> {
    let dir = TempDir::new()?;
    let utm = Layer::new("Reserva_Legal", vec![Row::new(Geom::Point(500_000.0, 8_000_000.0), "Reserva Legal Proposta", 1.0, RECIBO)])
        .with_prj(Some(UTM_23S_PRJ));
    let bare = Layer::new("Area_do_Imovel", vec![Row::new(Geom::square(0.0, 0.0, 1.0), "Área do Imovel", 1.0, RECIBO)]).with_prj(None);
    fixtures::write_loose(dir.path(), &[utm, bare])?;
    let set = resolve(dir.path())?;
    let reader = ShapefileReader::new();
    let rl = reader.read(set.get("Reserva_Legal").expect("rl"))?;
    let ai = reader.read(set.get("Area_do_Imovel").expect("ai"))?;
    assert_eq!(rl.crs, Some(Crs::Epsg(31983)));
    assert_eq!(ai.crs, None);
    Ok(())
}

#[test]
fn unmatched_names_give_an_empty_set_not_an_error() -> Result<()> {
    let dir = TempDir::new()?;
    fixtures::write_loose(dir.path(), &[Layer::new("Hidrografia", vec![Row::new(Geom::square(0.0, 0.0, 1.0), "Rio", 0.0, RECIBO)])])?;
    let set = resolve(dir.path())?;
    assert!(set.is_empty());
    Ok(())
}

#[test]
fn archives_without_inner_archives_are_rejected() -> Result<()> {
    let dir = TempDir::new()?;
    let flat = dir.path().join("flat.zip");
    std::fs::write(&flat, fixtures::zip_entries(&[("readme.txt".into(), b"hello".to_vec())])?)?;
    assert!(matches!(resolve(&flat), Err(cadastro_core::Error::InvalidInputShape(_))));
    Ok(())
}
