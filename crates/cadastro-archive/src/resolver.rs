use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use cadastro_core::types::SourceLayerHandle;
use cadastro_core::{Error, Result};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

use crate::catalogue::{has_required_columns, match_expected};
use crate::reader::ShapefileReader;

/// The three input layouts, decided by looking at contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputShape {
    /// A zip whose entries are single-layer zips.
    NestedArchive { outer: PathBuf, inner: Vec<String> },
    /// A directory of single-layer zips.
    ArchiveFolder { archives: Vec<PathBuf> },
    /// A directory of `.shp` files with their siblings.
    LooseFiles { shapefiles: Vec<PathBuf> },
}

impl InputShape {
    pub fn name(&self) -> &'static str {
        match self {
            InputShape::NestedArchive { .. } => "nested-archive",
            InputShape::ArchiveFolder { .. } => "archive-folder",
            InputShape::LooseFiles { .. } => "loose-files",
        }
    }

    /// `(base name, handle)` for every candidate, before any matching.
    fn candidates(&self) -> Vec<(String, SourceLayerHandle)> {
        match self {
            InputShape::NestedArchive { outer, inner } => inner
                .iter()
                .map(|entry| {
                    let handle = SourceLayerHandle::Nested { outer: outer.clone(), inner_entry: entry.clone() };
                    (base_name(entry), handle)
                })
                .collect(),
            InputShape::ArchiveFolder { archives } => archives
                .iter()
                .map(|archive| (base_name(&archive.to_string_lossy()), SourceLayerHandle::Archived { archive: archive.clone() }))
                .collect(),
            InputShape::LooseFiles { shapefiles } => shapefiles
                .iter()
                .map(|path| (base_name(&path.to_string_lossy()), SourceLayerHandle::Standalone { path: path.clone() }))
                .collect(),
        }
    }
}

/// Recognized layers in catalogue-match order. Empty when nothing matched;
/// callers turn that into [`Error::NoSourceLayers`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerSet {
    pub shape: InputShape,
    pub layers: Vec<(&'static str, SourceLayerHandle)>,
}

impl LayerSet {
    pub fn is_empty(&self) -> bool { self.layers.is_empty() }

    pub fn len(&self) -> usize { self.layers.len() }

    pub fn get(&self, expected: &str) -> Option<&SourceLayerHandle> {
        self.layers.iter().find(|(name, _)| *name == expected).map(|(_, handle)| handle)
    }
}

const ZIP_MAGIC: [&[u8]; 2] = [b"PK\x03\x04", b"PK\x05\x06"];

/// Decides the input layout.
///
/// A file must be a zip (magic bytes, or a `.zip` extension when the header
/// cannot be read) that contains at least one inner `.zip`. A directory is
/// an archive folder when it holds any top-level `.zip`, otherwise loose
/// files when it holds any top-level `.shp`.
pub fn classify_input(path: &Path) -> Result<InputShape> {
    if !path.exists() {
        return Err(Error::InputNotFound(path.to_path_buf()));
    }
    if path.is_file() {
        if !looks_like_zip(path) {
            return Err(Error::InvalidInputShape(format!("{} is neither a directory nor a zip archive", path.display())));
        }
        let zip = File::open(path)
            .map_err(zip::result::ZipError::Io)
            .and_then(ZipArchive::new)
            .map_err(|e| Error::InvalidInputShape(format!("{} is not a readable zip archive: {e}", path.display())))?;
        let mut inner: Vec<String> = zip.file_names().filter(|n| has_extension(n, "zip")).map(str::to_string).collect();
        if inner.is_empty() {
            return Err(Error::InvalidInputShape(format!("{} contains no inner archives", path.display())));
        }
        inner.sort();
        return Ok(InputShape::NestedArchive { outer: path.to_path_buf(), inner });
    }

    let listing: Vec<PathBuf> = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .collect();
    let archives: Vec<PathBuf> = listing.iter().filter(|p| has_extension(&p.to_string_lossy(), "zip")).cloned().collect();
    if !archives.is_empty() {
        return Ok(InputShape::ArchiveFolder { archives });
    }
    let shapefiles: Vec<PathBuf> = listing.into_iter().filter(|p| has_extension(&p.to_string_lossy(), "shp")).collect();
    if !shapefiles.is_empty() {
        return Ok(InputShape::LooseFiles { shapefiles });
    }
    Err(Error::InvalidInputShape(format!("{} holds neither archives nor shapefiles", path.display())))
}

/// Classifies `path`, then keeps every candidate whose name matches the
/// catalogue and whose header carries the required columns.
///
/// Candidates that fail to open or lack columns are skipped with a warning.
/// When two candidates claim the same expected layer the first (in sorted
/// order) is kept.
pub fn resolve(path: &Path) -> Result<LayerSet> {
    let shape = classify_input(path)?;
    info!(input = %path.display(), shape = shape.name(), "input classified");
    let probe = ShapefileReader::new();
    let mut layers: Vec<(&'static str, SourceLayerHandle)> = Vec::new();
    for (name, handle) in shape.candidates() {
        let Some(expected) = match_expected(&name) else {
            debug!(candidate = %name, "not a catalogued layer");
            continue;
        };
        if layers.iter().any(|(e, _)| *e == expected) {
            warn!(candidate = %name, layer = expected, "duplicate source layer ignored");
            continue;
        }
        match probe.probe(&handle) {
            Ok(columns) if has_required_columns(&columns) => {
                debug!(layer = expected, source = %handle, "source layer accepted");
                layers.push((expected, handle));
            }
            Ok(columns) => warn!(candidate = %name, ?columns, "missing required columns; skipped"),
            Err(e) => warn!(candidate = %name, error = %e, "probe failed; skipped"),
        }
    }
    Ok(LayerSet { shape, layers })
}

fn looks_like_zip(path: &Path) -> bool {
    let mut header = [0u8; 4];
    match File::open(path).and_then(|mut f| f.read_exact(&mut header)) {
        Ok(()) => ZIP_MAGIC.iter().any(|magic| header.as_slice() == *magic),
        Err(_) => has_extension(&path.to_string_lossy(), "zip"),
    }
}

fn has_extension(name: &str, ext: &str) -> bool {
    Path::new(name).extension().is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// File name without directories or extension.
fn base_name(name: &str) -> String {
    let path = Path::new(name);
    path.file_stem().map_or_else(|| name.to_string(), |s| s.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_names_strip_folders_and_extension() {
        assert_eq!(base_name("SICAR/Area_do_Imovel.zip"), "Area_do_Imovel");
        assert_eq!(base_name("Reserva_Legal"), "Reserva_Legal");
    }

    #[test]
    fn missing_input_is_reported() {
        let err = classify_input(Path::new("/definitely/not/here.zip")).expect_err("missing");
        assert!(matches!(err, Error::InputNotFound(_)));
    }

    #[test]
    fn plain_files_are_not_inputs() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "not a zip").expect("write");
        assert!(matches!(classify_input(&path), Err(Error::InvalidInputShape(_))));
    }

    #[test]
    fn truncated_zip_is_an_invalid_input_shape() {
        let dir = tempfile::TempDir::new().expect("tmp");
        let path = dir.path().join("car.zip");
        std::fs::write(&path, b"PK\x03\x04truncated download").expect("write");
        let err = classify_input(&path).expect_err("truncated");
        assert!(matches!(err, Error::InvalidInputShape(_)), "{err:?}");
        assert!(err.is_fatal());
    }
}
