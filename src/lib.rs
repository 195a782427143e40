//! Support Vector Machine training and inference
//!
//! Loads and saves libsvm compatible models, predicts labels, decision
//! values and probability estimates, and trains new models with an SMO
//! solver following "Working Set Selection Using Second Order Information
//! for Training Support Vector Machines" (Fan, Chen and Lin, 2005).

pub mod cache;
pub mod core;
pub mod data;
pub mod kernel;
pub mod machine;
pub mod metrics;
pub mod model;
pub mod persistence;
pub mod probability;
pub mod solver;
pub mod trainer;

// Re-export main types for convenience
pub use crate::core::traits::*;
pub use crate::core::types::*;
pub use crate::core::{Result, SVMError};
pub use crate::data::{DataFile, SampleSet};
pub use crate::kernel::Kernel;
pub use crate::machine::Machine;
pub use crate::metrics::EvaluationMetrics;
pub use crate::model::{Model, ModelParts, SupportVector};
pub use crate::persistence::ModelFormat;
pub use crate::trainer::Trainer;

// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
