//! cadastro-style
//!
//! Chooses the symbolizer and colors for each written layer and serializes
//! them as an SLD 1.1.0 document next to the layer.

pub mod descriptor;
pub mod sld;

pub use descriptor::{derive_style, StyleCase, StyleDescriptor};
pub use sld::{render_sld, style_for_output_name, write_style, SLD_EXTENSION};
