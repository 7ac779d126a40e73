//! cadastro-pipeline
//!
//! Classifier, output writer, packaging and the `Engine` that drives one run
//! from raw input to an ordered, styled output tree.

pub mod classifier;
pub mod engine;
pub mod package;
pub mod receipt;
pub mod writer;

pub use classifier::{Classification, Classifier};
pub use engine::{Engine, PackagedOutput};
pub use package::{package_directory, package_file_name};
pub use writer::{OutputWriter, ShapefileWriter, WrittenTheme};
