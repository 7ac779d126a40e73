use std::collections::{HashMap, HashSet};

use cadastro_core::reference::ReferenceModel;
use cadastro_core::traits::LayerReader;
use cadastro_core::types::{Feature, FeatureCollection, SourceLayerHandle, ThemeBucket};
use cadastro_core::{Error, Result};
use tracing::{debug, info, warn};

const THEME_COLUMN: &str = "tema";
const RECEIPT_COLUMN: &str = "recibo";

/// Everything the classifier learned from the source layers.
#[derive(Debug, Clone)]
pub struct Classification {
    /// One bucket per recognized label, in first-seen order.
    pub buckets: Vec<ThemeBucket>,
    /// First non-blank `recibo` value seen.
    pub receipt: Option<String>,
    pub layers_read: usize,
    /// `"{layer}: {reason}"` for every layer that failed to read.
    pub unreadable: Vec<String>,
    /// Deduplicated, capped unrecognized-label warnings.
    pub warnings: Vec<String>,
    pub unrecognized_total: usize,
}

/// Deduplicates messages and stops recording after `cap`, counting the rest.
#[derive(Debug)]
struct WarningLog {
    cap: usize,
    seen: HashSet<String>,
    entries: Vec<String>,
    suppressed: usize,
}

impl WarningLog {
    fn new(cap: usize) -> Self {
        Self { cap, seen: HashSet::new(), entries: Vec::new(), suppressed: 0 }
    }

    fn push(&mut self, key: &str, message: String) {
        if !self.seen.insert(key.to_string()) {
            return;
        }
        if self.entries.len() < self.cap {
            self.entries.push(message);
        } else {
            self.suppressed += 1;
        }
    }

    fn finish(mut self) -> (Vec<String>, usize) {
        let total = self.seen.len();
        if self.suppressed > 0 {
            self.entries.push(format!("... and {} more unrecognized theme(s)", self.suppressed));
        }
        (self.entries, total)
    }
}

pub struct Classifier<'m, R> {
    model: &'m ReferenceModel,
    reader: R,
    max_warnings: usize,
}

impl<'m, R: LayerReader> Classifier<'m, R> {
    pub fn new(model: &'m ReferenceModel, reader: R, max_warnings: usize) -> Self {
        Self { model, reader, max_warnings }
    }

    /// Reads every layer and buckets its records by recognized `tema`.
    ///
    /// Unreadable layers are skipped. Fails with [`Error::NoReadableLayers`]
    /// when none could be read and [`Error::NoThemesRecognized`] when no
    /// label matched the model.
    pub fn classify(&self, layers: &[(&'static str, SourceLayerHandle)]) -> Result<Classification> {
        let mut buckets: Vec<ThemeBucket> = Vec::new();
        let mut bucket_index: HashMap<&'static str, usize> = HashMap::new();
        let mut receipt: Option<String> = None;
        let mut unreadable = Vec::new();
        let mut log = WarningLog::new(self.max_warnings);
        let mut layers_read = 0usize;

        for (name, handle) in layers {
            let collection = match self.reader.read(handle) {
                Ok(collection) => collection,
                Err(e) => {
                    warn!(layer = *name, source = %handle, error = %e, "layer unreadable; skipped");
                    unreadable.push(Error::UnreadableLayer { layer: (*name).to_string(), reason: e.to_string() }.to_string());
                    continue;
                }
            };
            layers_read += 1;
            if receipt.is_none() {
                receipt = first_receipt(&collection.features);
            }

            let crs = collection.crs.clone();
            let (groups, missing) = partition_by_theme(collection.features);
            if missing > 0 {
                debug!(layer = *name, missing, "records without theme skipped");
            }
            for (label, features) in groups {
                let Some(entry) = self.model.lookup(&label) else {
                    log.push(&label, format!("unrecognized theme '{label}' in {name}"));
                    continue;
                };
                let slot = *bucket_index.entry(entry.descriptor.label).or_insert_with(|| {
                    buckets.push(ThemeBucket::new(entry.group, entry.descriptor));
                    buckets.len() - 1
                });
                debug!(layer = *name, theme = %label, count = features.len(), "theme collected");
                buckets[slot].push(FeatureCollection::new(crs.clone(), features));
            }
        }

        let (warnings, unrecognized_total) = log.finish();
        if unrecognized_total > 0 {
            warn!(count = unrecognized_total, "unrecognized theme label(s) skipped");
        }
        if layers_read == 0 {
            return Err(Error::NoReadableLayers(layers.len()));
        }
        if buckets.is_empty() {
            return Err(Error::NoThemesRecognized { layers: layers_read });
        }
        info!(layers = layers_read, themes = buckets.len(), "classification done");
        Ok(Classification { buckets, receipt, layers_read, unreadable, warnings, unrecognized_total })
    }
}

/// Splits records by trimmed `tema`, keeping first-seen label order.
/// Returns the groups and how many records had no usable label.
fn partition_by_theme(features: Vec<Feature>) -> (Vec<(String, Vec<Feature>)>, usize) {
    let mut groups: Vec<(String, Vec<Feature>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut missing = 0;
    for feature in features {
        let Some(label) = feature.attribute(THEME_COLUMN).and_then(|v| v.to_label()) else {
            missing += 1;
            continue;
        };
        match index.get(&label) {
            Some(&i) => groups[i].1.push(feature),
            None => {
                index.insert(label.clone(), groups.len());
                groups.push((label, vec![feature]));
            }
        }
    }
    (groups, missing)
}

fn first_receipt(features: &[Feature]) -> Option<String> {
    features.iter().find_map(|f| f.attribute(RECEIPT_COLUMN).and_then(|v| v.to_label()))
}
