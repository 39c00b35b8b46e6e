//! Mathematical utilities: the bin indicator basis, least squares, and the
//! distribution functions used for inference.

pub mod basis;
pub mod ols;
pub mod stats;

pub use basis::*;
pub use ols::*;
pub use stats::*;
