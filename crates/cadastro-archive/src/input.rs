use std::fs;
use std::path::{Path, PathBuf};

use cadastro_core::{Error, Result};
use tempfile::TempDir;
use tracing::debug;

/// An in-memory upload written to a private temp dir so it can be resolved
/// like any on-disk input. Removed when dropped.
#[derive(Debug)]
pub struct MaterializedInput {
    dir: TempDir,
    path: PathBuf,
}

impl MaterializedInput {
    /// Writes `bytes` as `{dir}/{file_name}`. Only the final component of
    /// `file_name` is used; an empty name becomes `input.zip`.
    pub fn from_bytes(bytes: &[u8], file_name: &str) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::InvalidInputShape("empty upload".into()));
        }
        let name = Path::new(file_name)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| "input.zip".to_string());
        let dir = tempfile::Builder::new().prefix("cadastro-input-").tempdir()?;
        let path = dir.path().join(name);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), size = bytes.len(), "input materialized");
        Ok(Self { dir, path })
    }

    pub fn path(&self) -> &Path { &self.path }

    pub fn dir(&self) -> &Path { self.dir.path() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temp_dir_disappears_on_drop() {
        let input = MaterializedInput::from_bytes(b"PK\x05\x06", "../../MT-5103403-ABC.zip").expect("input");
        let dir = input.dir().to_path_buf();
        assert_eq!(input.path().file_name().and_then(|n| n.to_str()), Some("MT-5103403-ABC.zip"));
        assert!(input.path().is_file());
        drop(input);
        assert!(!dir.exists());
    }

    #[test]
    fn empty_uploads_are_rejected() {
        assert!(MaterializedInput::from_bytes(&[], "x.zip").is_err());
    }
}
