use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{Feature, FeatureCollection, GeometryKind, SourceLayerHandle};

/// Opens a resolved source layer and returns all of its records.
pub trait LayerReader {
    fn read(&self, handle: &SourceLayerHandle) -> Result<FeatureCollection>;
}

impl<R: LayerReader + ?Sized> LayerReader for &R {
    fn read(&self, handle: &SourceLayerHandle) -> Result<FeatureCollection> { (**self).read(handle) }
}

/// A normalized, projected theme ready to be persisted.
#[derive(Debug, Clone, Copy)]
pub struct LayerPayload<'a> {
    pub columns: &'a [String],
    pub features: &'a [Feature],
    pub kind: GeometryKind,
    pub epsg: u32,
}

/// Persists one output layer. `stem` is the target path without extension;
/// the returned path is the layer's primary file.
pub trait LayerWriter {
    fn write_layer(&self, stem: &Path, layer: &LayerPayload<'_>) -> Result<PathBuf>;
}

impl<W: LayerWriter + ?Sized> LayerWriter for &W {
    fn write_layer(&self, stem: &Path, layer: &LayerPayload<'_>) -> Result<PathBuf> { (**self).write_layer(stem, layer) }
}
