//! Regression estimators over the day-bin design.
//!
//! Estimators are small, pure functions returning a `FittedModel` so the batch
//! and sweep harnesses can stay generic over the model dictionary.

pub mod design;
pub mod lasso;
pub mod linear;
pub mod model;

pub use design::*;
pub use lasso::*;
pub use linear::*;
pub use model::*;
