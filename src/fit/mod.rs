//! Sweep orchestration.
//!
//! Responsibilities:
//!
//! - anchor case rows to policy enactment dates (`anchor`)
//! - penalty grids and cross-validation for ridge (`alpha_grid`, `cross_val`)
//! - score fitted models (`metrics`)
//! - run the batch and single-policy harnesses (`batch`, `single_policy`)

pub mod alpha_grid;
pub mod anchor;
pub mod batch;
pub mod cross_val;
pub mod metrics;
pub mod single_policy;

pub use alpha_grid::*;
pub use anchor::*;
pub use batch::*;
pub use cross_val::*;
pub use metrics::*;
pub use single_policy::*;
