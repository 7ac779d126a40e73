use std::fs::{self, File};
use std::io::{self, Cursor, Read, Seek};
use std::path::{Path, PathBuf};

use cadastro_core::traits::LayerReader;
use cadastro_core::types::{Attributes, Feature, FeatureCollection, SourceLayerHandle};
use cadastro_core::{Error, Result};
use cadastro_geometry::crs_from_prj;
use tempfile::TempDir;
use tracing::{debug, warn};
use zip::ZipArchive;

use crate::shape::{to_attribute, to_geometry};

/// A single-layer archive unpacked into a private temporary directory.
/// The directory and everything in it is removed when this value drops.
pub struct ExtractedLayer {
    dir: TempDir,
    shp: PathBuf,
}

impl ExtractedLayer {
    /// Unpacks every file entry flat into a fresh temp dir (entry folders
    /// are ignored, extensions lowercased) and locates the `.shp`.
    pub fn from_archive<R: Read + Seek>(mut archive: ZipArchive<R>, label: &str) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("cadastro-layer-").tempdir()?;
        let mut shapes = Vec::new();
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(|e| Error::Archive(format!("{label}: {e}")))?;
            if entry.is_dir() {
                continue;
            }
            let Some(file_name) = Path::new(entry.name()).file_name().map(|n| lowercase_extension(&n.to_string_lossy())) else {
                continue;
            };
            let target = dir.path().join(&file_name);
            let mut out = File::create(&target)?;
            io::copy(&mut entry, &mut out)?;
            if file_name.ends_with(".shp") {
                shapes.push(target);
            }
        }
        shapes.sort();
        let mut shapes = shapes.into_iter();
        let shp = shapes.next().ok_or_else(|| Error::Archive(format!("{label}: no .shp entry")))?;
        if shapes.len() > 0 {
            warn!(archive = label, extra = shapes.len(), "archive holds more than one layer; using the first");
        }
        debug!(archive = label, dir = %dir.path().display(), "extracted layer");
        Ok(Self { dir, shp })
    }

    pub fn open(archive: &Path) -> Result<Self> {
        let file = File::open(archive)?;
        let zip = ZipArchive::new(file).map_err(|e| Error::Archive(format!("{}: {e}", archive.display())))?;
        Self::from_archive(zip, &archive.display().to_string())
    }

    /// Opens `inner_entry` of `outer` in memory and extracts that inner
    /// archive. The outer archive is never written to disk.
    pub fn open_nested(outer: &Path, inner_entry: &str) -> Result<Self> {
        let label = format!("{}!{inner_entry}", outer.display());
        let file = File::open(outer)?;
        let mut zip = ZipArchive::new(file).map_err(|e| Error::Archive(format!("{}: {e}", outer.display())))?;
        let mut bytes = Vec::new();
        zip.by_name(inner_entry).map_err(|e| Error::Archive(format!("{label}: {e}")))?.read_to_end(&mut bytes)?;
        let inner = ZipArchive::new(Cursor::new(bytes)).map_err(|e| Error::Archive(format!("{label}: {e}")))?;
        Self::from_archive(inner, &label)
    }

    pub fn shp(&self) -> &Path { &self.shp }

    pub fn dir(&self) -> &Path { self.dir.path() }
}

/// A layer ready to be read from disk; extracted layers keep their temp dir
/// alive for as long as this value lives.
pub enum OpenedLayer {
    OnDisk(PathBuf),
    Extracted(ExtractedLayer),
}

impl OpenedLayer {
    pub fn open(handle: &SourceLayerHandle) -> Result<Self> {
        match handle {
            SourceLayerHandle::Standalone { path } => Ok(Self::OnDisk(path.clone())),
            SourceLayerHandle::Archived { archive } => ExtractedLayer::open(archive).map(Self::Extracted),
            SourceLayerHandle::Nested { outer, inner_entry } => ExtractedLayer::open_nested(outer, inner_entry).map(Self::Extracted),
        }
    }

    pub fn shp(&self) -> &Path {
        match self {
            Self::OnDisk(path) => path,
            Self::Extracted(layer) => layer.shp(),
        }
    }
}

/// Reads layers with the `shapefile` crate, extracting archives as needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShapefileReader;

impl ShapefileReader {
    pub fn new() -> Self { Self }

    /// Attribute column names of the layer behind `handle`, header only.
    pub fn probe(&self, handle: &SourceLayerHandle) -> Result<Vec<String>> {
        let opened = OpenedLayer::open(handle)?;
        probe_columns(opened.shp())
    }
}

impl LayerReader for ShapefileReader {
    fn read(&self, handle: &SourceLayerHandle) -> Result<FeatureCollection> {
        let opened = OpenedLayer::open(handle)?;
        read_collection(opened.shp())
    }
}

/// Column names from the `.dbf` header, in table order.
pub fn probe_columns(shp: &Path) -> Result<Vec<String>> {
    let dbf = sibling(shp, "dbf").ok_or_else(|| Error::Shapefile(format!("{}: missing .dbf", shp.display())))?;
    let reader = shapefile::dbase::Reader::from_path(&dbf).map_err(|e| Error::Shapefile(format!("{}: {e}", dbf.display())))?;
    Ok(reader.fields().iter().map(|f| f.name().to_string()).collect())
}

/// Reads every record of a shapefile. Attribute names are lowercased and
/// the CRS comes from the `.prj` sibling when there is one.
pub fn read_collection(shp: &Path) -> Result<FeatureCollection> {
    let columns = probe_columns(shp)?;
    let mut reader = shapefile::Reader::from_path(shp).map_err(|e| Error::Shapefile(format!("{}: {e}", shp.display())))?;
    let mut features = Vec::new();
    let mut rejected = 0usize;
    for item in reader.iter_shapes_and_records() {
        let (shape, record) = item.map_err(|e| Error::Shapefile(format!("{}: {e}", shp.display())))?;
        let geometry = match to_geometry(&shape) {
            Ok(geometry) => geometry,
            Err(e) => {
                rejected += 1;
                debug!(layer = %shp.display(), error = %e, "record skipped");
                continue;
            }
        };
        let attributes: Attributes = columns
            .iter()
            .filter_map(|name| record.get(name).map(|value| (name.to_lowercase(), to_attribute(value))))
            .collect();
        features.push(Feature::new(geometry, attributes));
    }
    if rejected > 0 {
        warn!(layer = %shp.display(), rejected, "unsupported records skipped");
    }
    let crs = match sibling(shp, "prj") {
        Some(prj) => Some(crs_from_prj(&String::from_utf8_lossy(&fs::read(prj)?))),
        None => None,
    };
    debug!(layer = %shp.display(), count = features.len(), crs = ?crs, "layer read");
    Ok(FeatureCollection::new(crs, features))
}

/// `shp` with extension `ext`, trying lower then upper case.
fn sibling(shp: &Path, ext: &str) -> Option<PathBuf> {
    [ext.to_lowercase(), ext.to_uppercase()].into_iter().map(|e| shp.with_extension(e)).find(|p| p.is_file())
}

fn lowercase_extension(file_name: &str) -> String {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}.{}", ext.to_lowercase()),
        None => file_name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extensions_are_lowercased_stems_kept() {
        assert_eq!(lowercase_extension("Area_do_Imovel.SHP"), "Area_do_Imovel.shp");
        assert_eq!(lowercase_extension("README"), "README");
    }
}
