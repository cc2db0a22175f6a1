//! Core definitions (error taxonomy and precondition helpers), relied upon by all nmem-* crates.

pub mod error;
pub mod result;

pub use error::{Error, ErrorKind};
pub use result::Result;
