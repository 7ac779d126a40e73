use std::fs;
use std::io::{Cursor, Write};
use std::path::{Component, Path};

use cadastro_core::types::ProcessingResult;
use cadastro_core::{Error, Result};
use cadastro_style::SLD_EXTENSION;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::writer::with_suffix;

/// Component files shipped for every generated layer, when present.
pub const LAYER_EXTENSIONS: [&str; 5] = ["shp", "shx", "dbf", "prj", "cpg"];

pub fn package_file_name(receipt: &str) -> String {
    format!("{receipt}_processado.zip")
}

/// Zips every generated layer (and its `.sld` when `include_styles`) with
/// paths relative to `root`, so folders keep their ordered names.
pub fn package_directory(result: &ProcessingResult, root: &Path, include_styles: bool) -> Result<Vec<u8>> {
    let zip_err = |e: zip::result::ZipError| Error::Archive(format!("packaging {}: {e}", result.receipt));
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let mut entries = 0usize;

    for shp in &result.generated {
        let absolute = if shp.is_absolute() { shp.clone() } else { root.join(shp) };
        let stem = absolute.with_extension("");
        let extensions = LAYER_EXTENSIONS.iter().copied().chain(include_styles.then_some(SLD_EXTENSION));
        for ext in extensions {
            let file = with_suffix(&stem, ext);
            if !file.is_file() {
                continue;
            }
            let relative = file.strip_prefix(root).map_err(|_| Error::Archive(format!("{} is outside {}", file.display(), root.display())))?;
            zip.start_file(entry_name(relative), options).map_err(zip_err)?;
            zip.write_all(&fs::read(&file)?)?;
            entries += 1;
        }
    }
    let bytes = zip.finish().map_err(zip_err)?.into_inner();
    debug!(receipt = %result.receipt, entries, size = bytes.len(), "output packaged");
    Ok(bytes)
}

/// Forward-slash archive path from a relative filesystem path.
fn entry_name(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
