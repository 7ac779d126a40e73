//! cadastro-core
//!
//! Shared data model, error taxonomy, configuration and the static theme
//! taxonomy used by every stage of the cadastral reorganization pipeline.

#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod reference;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
