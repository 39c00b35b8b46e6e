//! Terminal and text-file reporting.

pub mod format;

pub use format::*;
