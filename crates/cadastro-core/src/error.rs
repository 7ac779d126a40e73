use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Unsupported input shape: {0}")]
    InvalidInputShape(String),

    #[error("No recognized source layers found")]
    NoSourceLayers,

    #[error("None of the {0} recognized source layer(s) could be read")]
    NoReadableLayers(usize),

    #[error("No recognized theme found across {layers} readable layer(s)")]
    NoThemesRecognized { layers: usize },

    #[error("No theme could be written: {0}")]
    NoThemesWritten(String),

    #[error("Processing aborted: {0}")]
    Aborted(String),

    #[error("Unreadable layer {layer}: {reason}")]
    UnreadableLayer { layer: String, reason: String },

    #[error("Zero features after cleanup for {0}")]
    EmptyAfterCleanup(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Shapefile error: {0}")]
    Shapefile(String),

    #[error("Projection error: {0}")]
    Projection(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error aborts a whole run instead of a single layer or theme.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InputNotFound(_)
                | Error::InvalidInputShape(_)
                | Error::NoSourceLayers
                | Error::NoReadableLayers(_)
                | Error::NoThemesRecognized { .. }
                | Error::NoThemesWritten(_)
                | Error::Aborted(_)
        )
    }

    /// Lifts a layer or theme level error that escaped a whole run into
    /// the fatal taxonomy.
    pub fn into_fatal(self) -> Self {
        if self.is_fatal() { self } else { Error::Aborted(self.to_string()) }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
