//! Output backends.

pub mod svg;
