//! SVM solver implementations
//!
//! This module implements Sequential Minimal Optimization (SMO) with
//! second-order working-set selection, shrinking and a column kernel cache,
//! plus the five dual formulations (C-SVC, nu-SVC, one-class, epsilon-SVR,
//! nu-SVR) built on top of it.

pub mod formulations;
pub mod qmatrix;
pub mod shrinking;
pub mod smo;

pub use self::formulations::{train_one, DecisionFunction};
pub use self::qmatrix::{OneClassQ, QMatrix, SvcQ, SvrQ};
pub use self::smo::{SolutionInfo, Solver, SolverConfig, SolverVariant};
