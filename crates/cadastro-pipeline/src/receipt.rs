//! Receipt (`recibo`) selection for naming a run's output.

use std::path::Path;

/// Minimum stem length (exclusive) for a file name to count as a receipt.
const MIN_NAME_LEN: usize = 10;

/// The input file's stem when it looks like a SICAR receipt: contains a
/// `-` and is longer than ten characters. Directories never qualify.
pub fn receipt_from_name(input: &Path) -> Option<String> {
    if input.is_dir() {
        return None;
    }
    let stem = input.file_stem()?.to_string_lossy();
    let stem = stem.trim();
    (stem.contains('-') && stem.chars().count() > MIN_NAME_LEN).then(|| sanitize(stem))
}

/// Name rule first, then the value found in the data, then `default`.
pub fn resolve_receipt(input: &Path, from_data: Option<&str>, default: &str) -> String {
    receipt_from_name(input)
        .or_else(|| from_data.map(sanitize).filter(|r| !r.is_empty()))
        .unwrap_or_else(|| default.to_string())
}

/// Receipts become directory and file names; keep them to one component.
fn sanitize(raw: &str) -> String {
    let raw = raw.trim();
    if raw.chars().all(|c| c == '.') {
        return raw.replace('.', "_");
    }
    raw.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_shaped_names_win() {
        let input = Path::new("/tmp/MT-5103403-0A1B2C3D4E5F.zip");
        assert_eq!(resolve_receipt(input, Some("OTHER"), "CAR_Processado"), "MT-5103403-0A1B2C3D4E5F");
    }

    #[test]
    fn short_or_dashless_names_fall_back_to_data() {
        assert_eq!(resolve_receipt(Path::new("/tmp/input.zip"), Some(" MT-1 "), "CAR_Processado"), "MT-1");
        assert_eq!(resolve_receipt(Path::new("/tmp/a-b.zip"), None, "CAR_Processado"), "CAR_Processado");
        assert_eq!(resolve_receipt(Path::new("/tmp/SHAPEFILE_CAR_2024.zip"), Some("  "), "CAR_Processado"), "CAR_Processado");
    }

    #[test]
    fn receipts_cannot_escape_the_output_root() {
        assert_eq!(resolve_receipt(Path::new("/tmp/x.zip"), Some("../MT/1"), "d"), ".._MT_1");
        assert_eq!(resolve_receipt(Path::new("/tmp/x.zip"), Some(".."), "d"), "__");
    }
}
