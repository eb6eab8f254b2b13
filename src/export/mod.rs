//! Output side: `.eml` naming and writing, batch conversion.

pub mod batch;
pub mod eml;
