use std::fs;
use std::path::{Path, PathBuf};

use cadastro_archive::{resolve, MaterializedInput, ShapefileReader};
use cadastro_core::config::EngineConfig;
use cadastro_core::reference::ReferenceModel;
use cadastro_core::traits::{LayerReader, LayerWriter};
use cadastro_core::types::{ProcessingResult, ThemeBucket};
use cadastro_core::{Error, Result};
use cadastro_geometry::{is_supported, Normalizer};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::classifier::Classifier;
use crate::package::{package_directory, package_file_name};
use crate::receipt::resolve_receipt;
use crate::writer::{OutputWriter, ShapefileWriter};

/// A processed upload: the zipped output tree and the run's report.
#[derive(Debug, Clone, Serialize)]
pub struct PackagedOutput {
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub result: ProcessingResult,
}

/// Drives resolver, classifier, normalizer and writer for one input.
///
/// Holds no per-run state; one engine can serve any number of runs,
/// including concurrent ones on separate threads.
pub struct Engine<R = ShapefileReader, W = ShapefileWriter> {
    config: EngineConfig,
    model: &'static ReferenceModel,
    reader: R,
    writer: W,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        Self::with_io(config, ShapefileReader::new(), ShapefileWriter::new())
    }
}

impl<R: LayerReader, W: LayerWriter> Engine<R, W> {
    pub fn with_io(config: EngineConfig, reader: R, writer: W) -> Result<Self> {
        config.validate()?;
        if !is_supported(config.target_epsg) {
            return Err(Error::InvalidConfig(format!("engine.target_epsg {} is not a supported CRS", config.target_epsg)));
        }
        Ok(Self { config, model: ReferenceModel::standard(), reader, writer })
    }

    pub fn config(&self) -> &EngineConfig { &self.config }

    /// Processes `input` into `{output_root}/{receipt}`, or into
    /// `{input parent}/{prefix}{receipt}` when no root is given.
    ///
    /// Every error returned here is fatal.
    pub fn process_path(&self, input: &Path, output_root: Option<&Path>) -> Result<ProcessingResult> {
        self.run(input, output_root, self.config.include_styles).map_err(Error::into_fatal)
    }

    /// Processes an in-memory archive named `input.zip`.
    pub fn process_bytes(&self, bytes: &[u8], include_styles: bool) -> Result<PackagedOutput> {
        self.process_upload(bytes, "input.zip", include_styles)
    }

    /// Processes an in-memory archive, keeping `file_name` so a
    /// receipt-shaped upload name can name the output.
    ///
    /// Input and output live in temp dirs that are gone when this returns,
    /// whether it succeeds or not. Generated paths in the returned result are
    /// relative to the archive root.
    pub fn process_upload(&self, bytes: &[u8], file_name: &str, include_styles: bool) -> Result<PackagedOutput> {
        self.package(bytes, file_name, include_styles).map_err(Error::into_fatal)
    }

    fn package(&self, bytes: &[u8], file_name: &str, include_styles: bool) -> Result<PackagedOutput> {
        let input = MaterializedInput::from_bytes(bytes, file_name)?;
        let scratch = tempfile::Builder::new().prefix("cadastro-output-").tempdir()?;
        let mut result = self.run(input.path(), Some(scratch.path()), include_styles)?;
        let root = result.output_dir.clone().unwrap_or_else(|| scratch.path().join(&result.receipt));
        let bytes = package_directory(&result, &root, include_styles)?;
        result.relativize(&root);
        let file_name = package_file_name(&result.receipt);
        info!(file = %file_name, size = bytes.len(), themes = result.themes_written, "upload processed");
        Ok(PackagedOutput { bytes, file_name, result })
    }

    fn run(&self, input: &Path, output_root: Option<&Path>, styles: bool) -> Result<ProcessingResult> {
        info!(input = %input.display(), "processing");
        let layers = resolve(input)?;
        if layers.is_empty() {
            return Err(Error::NoSourceLayers);
        }
        info!(count = layers.len(), shape = layers.shape.name(), "source layers found");

        let classification = Classifier::new(self.model, &self.reader, self.config.max_warnings).classify(&layers.layers)?;
        let receipt = resolve_receipt(input, classification.receipt.as_deref(), &self.config.default_receipt);
        let output_dir = match output_root {
            Some(root) => root.join(&receipt),
            None => parent_of(input).join(format!("{}{receipt}", self.config.output_prefix)),
        };
        info!(receipt = %receipt, output = %output_dir.display(), "receipt resolved");

        let created = !output_dir.exists();
        fs::create_dir_all(&output_dir)?;

        let mut result = ProcessingResult::new(receipt);
        result.output_dir = Some(output_dir.clone());
        result.warnings.extend(classification.unreadable);
        result.warnings.extend(classification.warnings);

        let normalizer = Normalizer::new(self.config.target_epsg);
        let writer = OutputWriter::new(&output_dir, self.model, &self.writer, styles);
        for bucket in self.ordered(classification.buckets) {
            let (group, descriptor) = (bucket.group, bucket.descriptor);
            let written = normalizer
                .normalize(descriptor.label, descriptor.kind, bucket.into_collections())
                .and_then(|layer| writer.write_theme(group, descriptor, layer));
            match written {
                Ok(theme) => result.record_written(theme.path, theme.features),
                Err(e) => {
                    warn!(theme = descriptor.output_name, error = %e, "theme not written");
                    result.record_error(descriptor.output_name, e);
                }
            }
        }

        if !result.succeeded() {
            if created {
                if let Err(e) = fs::remove_dir_all(&output_dir) {
                    warn!(output = %output_dir.display(), error = %e, "could not remove empty output directory");
                }
            }
            error!(errors = result.errors.len(), "no theme could be written");
            return Err(Error::NoThemesWritten(result.errors.join("; ")));
        }
        info!(themes = result.themes_written, features = result.feature_total, errors = result.errors.len(), "processing complete");
        Ok(result)
    }

    /// Canonical (group order, theme order) sequence.
    fn ordered(&self, mut buckets: Vec<ThemeBucket>) -> Vec<ThemeBucket> {
        buckets.sort_by_key(|b| self.model.lookup(b.descriptor.label).map_or(usize::MAX, |e| e.rank));
        buckets
    }
}

fn parent_of(input: &Path) -> PathBuf {
    match input.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}
