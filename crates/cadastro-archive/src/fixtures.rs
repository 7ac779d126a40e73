//! Synthetic SICAR layers for tests.
//!
//! `.shp`/`.shx` are written byte by byte so a single layer can mix point and
//! polygon records the way some exports do; the `.dbf` goes through `dbase`.

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use shapefile::dbase::{FieldName, FieldValue, Record, TableWriterBuilder};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub const SIRGAS_PRJ: &str = r#"GEOGCS["GCS_SIRGAS_2000",DATUM["D_SIRGAS_2000",SPHEROID["GRS_1980",6378137.0,298.257222101]],PRIMEM["Greenwich",0.0],UNIT["Degree",0.0174532925199433]]"#;
pub const UTM_23S_PRJ: &str = r#"PROJCS["SIRGAS 2000 / UTM zone 23S",GEOGCS["SIRGAS 2000"],AUTHORITY["EPSG","31983"]]"#;

#[derive(Debug, Clone)]
pub enum Geom {
    Null,
    Point(f64, f64),
    MultiPoint(Vec<(f64, f64)>),
    /// Closed outer ring.
    Polygon(Vec<(f64, f64)>),
}

impl Geom {
    /// Unit-ish square with lower-left corner at `(x, y)`.
    pub fn square(x: f64, y: f64, side: f64) -> Self {
        Geom::Polygon(vec![(x, y), (x, y + side), (x + side, y + side), (x + side, y), (x, y)])
    }

    fn type_code(&self) -> i32 {
        match self {
            Geom::Null => 0,
            Geom::Point(..) => 1,
            Geom::Polygon(_) => 5,
            Geom::MultiPoint(_) => 8,
        }
    }

    fn points(&self) -> Vec<(f64, f64)> {
        match self {
            Geom::Null => vec![],
            Geom::Point(x, y) => vec![(*x, *y)],
            Geom::MultiPoint(p) | Geom::Polygon(p) => p.clone(),
        }
    }

    fn content(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&self.type_code().to_le_bytes());
        let points = self.points();
        match self {
            Geom::Null => {}
            Geom::Point(x, y) => {
                out.extend_from_slice(&x.to_le_bytes());
                out.extend_from_slice(&y.to_le_bytes());
            }
            Geom::MultiPoint(_) | Geom::Polygon(_) => {
                for v in bbox(&points) {
                    out.extend_from_slice(&v.to_le_bytes());
                }
                if matches!(self, Geom::Polygon(_)) {
                    out.extend_from_slice(&1i32.to_le_bytes());
                }
                out.extend_from_slice(&i32::try_from(points.len()).unwrap_or(i32::MAX).to_le_bytes());
                if matches!(self, Geom::Polygon(_)) {
                    out.extend_from_slice(&0i32.to_le_bytes());
                }
                for (x, y) in &points {
                    out.extend_from_slice(&x.to_le_bytes());
                    out.extend_from_slice(&y.to_le_bytes());
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub geom: Geom,
    pub tema: String,
    pub area: f64,
    pub recibo: String,
    /// Extra character columns, e.g. `municipio`.
    pub extra: Vec<(String, String)>,
}

impl Row {
    pub fn new(geom: Geom, tema: &str, area: f64, recibo: &str) -> Self {
        Self { geom, tema: tema.to_string(), area, recibo: recibo.to_string(), extra: Vec::new() }
    }

    pub fn with(mut self, column: &str, value: &str) -> Self {
        self.extra.push((column.to_string(), value.to_string()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct Layer {
    pub name: String,
    pub rows: Vec<Row>,
    pub prj: Option<String>,
    /// Leave out the `recibo` column entirely.
    pub without_recibo: bool,
}

impl Layer {
    pub fn new(name: &str, rows: Vec<Row>) -> Self {
        Self { name: name.to_string(), rows, prj: Some(SIRGAS_PRJ.to_string()), without_recibo: false }
    }

    pub fn with_prj(mut self, prj: Option<&str>) -> Self {
        self.prj = prj.map(str::to_string);
        self
    }

    pub fn without_recibo(mut self) -> Self {
        self.without_recibo = true;
        self
    }

    /// Writes `{dir}/{name}.shp` and its siblings; returns the `.shp` path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let shp = dir.join(format!("{}.shp", self.name));
        let (shp_bytes, shx_bytes) = self.shape_files();
        fs::write(&shp, shp_bytes)?;
        fs::write(shp.with_extension("shx"), shx_bytes)?;
        self.write_dbf(&shp.with_extension("dbf"))?;
        if let Some(prj) = &self.prj {
            fs::write(shp.with_extension("prj"), prj)?;
        }
        Ok(shp)
    }

    /// The layer as a single-layer zip, entries flat.
    pub fn zip_bytes(&self) -> std::io::Result<Vec<u8>> {
        let dir = tempfile::TempDir::new()?;
        self.write_to(dir.path())?;
        let mut files: Vec<PathBuf> = fs::read_dir(dir.path())?.filter_map(|e| e.ok().map(|e| e.path())).collect();
        files.sort();
        let entries = files
            .iter()
            .map(|p| Ok((p.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default(), fs::read(p)?)))
            .collect::<std::io::Result<Vec<_>>>()?;
        zip_entries(&entries)
    }

    fn shape_files(&self) -> (Vec<u8>, Vec<u8>) {
        let contents: Vec<Vec<u8>> = self.rows.iter().map(|r| r.geom.content()).collect();
        let all_points: Vec<(f64, f64)> = self.rows.iter().flat_map(|r| r.geom.points()).collect();
        let shape_type = self.rows.iter().map(|r| r.geom.type_code()).find(|c| *c != 0).unwrap_or(0);

        let mut records = Vec::new();
        let mut index = Vec::new();
        let mut offset_words = 50i32;
        for (i, content) in contents.iter().enumerate() {
            let len_words = i32::try_from(content.len() / 2).unwrap_or(i32::MAX);
            index.extend_from_slice(&offset_words.to_be_bytes());
            index.extend_from_slice(&len_words.to_be_bytes());
            records.extend_from_slice(&(i32::try_from(i).unwrap_or(i32::MAX) + 1).to_be_bytes());
            records.extend_from_slice(&len_words.to_be_bytes());
            records.extend_from_slice(content);
            offset_words += 4 + len_words;
        }
        let bounds = bbox(&all_points);
        let shp_len = i32::try_from((100 + records.len()) / 2).unwrap_or(i32::MAX);
        let shx_len = i32::try_from((100 + index.len()) / 2).unwrap_or(i32::MAX);
        let mut shp = header(shp_len, shape_type, bounds);
        shp.extend(records);
        let mut shx = header(shx_len, shape_type, bounds);
        shx.extend(index);
        (shp, shx)
    }

    fn write_dbf(&self, path: &Path) -> std::io::Result<()> {
        let name = |n: &str| FieldName::try_from(n).map_err(|e| std::io::Error::other(format!("{e:?}")));
        let mut extra_columns: Vec<String> = Vec::new();
        for row in &self.rows {
            for (column, _) in &row.extra {
                if !extra_columns.contains(column) {
                    extra_columns.push(column.clone());
                }
            }
        }
        let mut builder = TableWriterBuilder::new().add_character_field(name("tema")?, 254).add_numeric_field(name("area")?, 19, 8);
        if !self.without_recibo {
            builder = builder.add_character_field(name("recibo")?, 254);
        }
        for column in &extra_columns {
            builder = builder.add_character_field(name(column)?, 254);
        }
        let records: Vec<Record> = self
            .rows
            .iter()
            .map(|row| {
                let mut record = Record::default();
                record.insert("tema".to_string(), FieldValue::Character(Some(row.tema.clone())));
                record.insert("area".to_string(), FieldValue::Numeric(Some(row.area)));
                if !self.without_recibo {
                    record.insert("recibo".to_string(), FieldValue::Character(Some(row.recibo.clone())));
                }
                for column in &extra_columns {
                    let value = row.extra.iter().find(|(c, _)| c == column).map(|(_, v)| v.clone());
                    record.insert(column.clone(), FieldValue::Character(value));
                }
                record
            })
            .collect();
        let writer = builder.build_with_file_dest(path).map_err(|e| std::io::Error::other(e.to_string()))?;
        writer.write_records(&records).map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(())
    }
}

/// `name -> bytes` entries packed into a deflated zip.
pub fn zip_entries(entries: &[(String, Vec<u8>)]) -> std::io::Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options).map_err(|e| std::io::Error::other(e.to_string()))?;
        zip.write_all(bytes)?;
    }
    Ok(zip.finish().map_err(|e| std::io::Error::other(e.to_string()))?.into_inner())
}

/// Loose-files input: every layer written straight into `dir`.
pub fn write_loose(dir: &Path, layers: &[Layer]) -> std::io::Result<()> {
    for layer in layers {
        layer.write_to(dir)?;
    }
    Ok(())
}

/// Archive-folder input: one `{name}.zip` per layer in `dir`.
pub fn write_archive_folder(dir: &Path, layers: &[Layer]) -> std::io::Result<()> {
    for layer in layers {
        fs::write(dir.join(format!("{}.zip", layer.name)), layer.zip_bytes()?)?;
    }
    Ok(())
}

/// Nested-archive input as bytes: an outer zip of per-layer zips.
pub fn nested_archive_bytes(layers: &[Layer]) -> std::io::Result<Vec<u8>> {
    let entries = layers.iter().map(|l| Ok((format!("{}.zip", l.name), l.zip_bytes()?))).collect::<std::io::Result<Vec<_>>>()?;
    zip_entries(&entries)
}

pub fn write_nested(path: &Path, layers: &[Layer]) -> std::io::Result<()> {
    fs::write(path, nested_archive_bytes(layers)?)
}

fn header(length_words: i32, shape_type: i32, bounds: [f64; 4]) -> Vec<u8> {
    let mut out = Vec::with_capacity(100);
    out.extend_from_slice(&9994i32.to_be_bytes());
    out.extend_from_slice(&[0u8; 20]);
    out.extend_from_slice(&length_words.to_be_bytes());
    out.extend_from_slice(&1000i32.to_le_bytes());
    out.extend_from_slice(&shape_type.to_le_bytes());
    for v in bounds {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out.extend_from_slice(&[0u8; 32]);
    out
}

fn bbox(points: &[(f64, f64)]) -> [f64; 4] {
    if points.is_empty() {
        return [0.0; 4];
    }
    points.iter().fold([f64::MAX, f64::MAX, f64::MIN, f64::MIN], |[x0, y0, x1, y1], (x, y)| {
        [x0.min(*x), y0.min(*y), x1.max(*x), y1.max(*y)]
    })
}
