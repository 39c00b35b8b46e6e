//! Input/output helpers.
//!
//! - raw and cleaned CSV/JSON ingest (`ingest`)
//! - result paths and JSON/text exports (`export`)

pub mod export;
pub mod ingest;

pub use export::*;
pub use ingest::*;
