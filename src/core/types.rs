//! Core type definitions for SVM

use crate::core::{Result, SVMError};
use crate::kernel::Kernel;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Formulation of the SVM problem
///
/// Decides whether a model classifies, estimates a support (one-class) or
/// regresses, and which training hyperparameters are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SvmType {
    /// C-Support Vector Classification
    CSvc,
    /// nu-Support Vector Classification
    NuSvc,
    /// One-class SVM (support estimation)
    OneClass,
    /// epsilon-Support Vector Regression
    EpsilonSvr,
    /// nu-Support Vector Regression
    NuSvr,
}

impl SvmType {
    /// Token used by the libsvm text model format
    pub fn as_str(&self) -> &'static str {
        match self {
            SvmType::CSvc => "c_svc",
            SvmType::NuSvc => "nu_svc",
            SvmType::OneClass => "one_class",
            SvmType::EpsilonSvr => "epsilon_svr",
            SvmType::NuSvr => "nu_svr",
        }
    }

    /// True for the multi-class classification formulations
    pub fn is_classification(&self) -> bool {
        matches!(self, SvmType::CSvc | SvmType::NuSvc)
    }

    /// True for the regression formulations
    pub fn is_regression(&self) -> bool {
        matches!(self, SvmType::EpsilonSvr | SvmType::NuSvr)
    }
}

impl fmt::Display for SvmType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SvmType {
    type Err = SVMError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "c_svc" => Ok(SvmType::CSvc),
            "nu_svc" => Ok(SvmType::NuSvc),
            "one_class" => Ok(SvmType::OneClass),
            "epsilon_svr" => Ok(SvmType::EpsilonSvr),
            "nu_svr" => Ok(SvmType::NuSvr),
            other => Err(SVMError::FormatError(format!("unknown svm type: {}", other))),
        }
    }
}

/// Prediction result containing label and raw decision values
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Predicted class label (integral for classification, the function
    /// value for regression)
    pub label: f64,
    /// Decision values, one per pairwise sub-classifier
    pub scores: Vec<f64>,
}

impl Prediction {
    /// Create a new prediction
    pub fn new(label: f64, scores: Vec<f64>) -> Self {
        Self { label, scores }
    }
}

/// Prediction result carrying per-class probability estimates
#[derive(Debug, Clone, PartialEq)]
pub struct ProbabilityPrediction {
    /// Class with the highest estimated probability
    pub label: f64,
    /// Probability per class, in the model's class order
    pub probabilities: Vec<f64>,
}

/// Sparse vector representation with sorted indices
///
/// Indices are 0-based. Files use 1-based indices and convert at the boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// Sorted indices of non-zero elements
    pub indices: Vec<usize>,
    /// Values corresponding to indices
    pub values: Vec<f64>,
}

impl SparseVector {
    /// Create a sparse vector from parallel index and value lists, sorting by index
    ///
    /// The lists must have the same length; surplus entries of the longer
    /// one are ignored in release builds.
    pub fn new(indices: Vec<usize>, values: Vec<f64>) -> Self {
        debug_assert_eq!(
            indices.len(),
            values.len(),
            "indices and values must have the same length"
        );

        // Sort by indices
        let mut pairs: Vec<_> = indices.into_iter().zip(values).collect();
        pairs.sort_by_key(|&(idx, _)| idx);

        let (indices, values): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        Self { indices, values }
    }

    /// Create an empty sparse vector
    pub fn empty() -> Self {
        Self {
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build from a dense slice, keeping only the non-zero entries
    pub fn from_dense(dense: &[f64]) -> Self {
        let mut indices = Vec::new();
        let mut values = Vec::new();
        for (i, &v) in dense.iter().enumerate() {
            if v != 0.0 {
                indices.push(i);
                values.push(v);
            }
        }
        Self { indices, values }
    }

    /// Expand into a dense vector of length `len`
    ///
    /// Entries at or beyond `len` are dropped.
    pub fn to_dense(&self, len: usize) -> Vec<f64> {
        let mut dense = vec![0.0; len];
        for (&i, &v) in self.indices.iter().zip(&self.values) {
            if i < len {
                dense[i] = v;
            }
        }
        dense
    }

    /// Get the value at a specific index (0 if not present)
    pub fn get(&self, index: usize) -> f64 {
        match self.indices.binary_search(&index) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    /// Smallest dense length able to hold this vector
    pub fn dimension(&self) -> usize {
        self.indices.last().map_or(0, |&i| i + 1)
    }

    /// Check if vector is empty
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

/// Labelled sample with sparse features
#[derive(Clone, Debug, PartialEq)]
pub struct Sample {
    /// Feature vector (sparse representation)
    pub features: SparseVector,
    /// Class label or regression target
    pub label: f64,
}

impl Sample {
    /// Create a new sample
    pub fn new(features: SparseVector, label: f64) -> Self {
        Self { features, label }
    }
}

/// Training hyperparameters
///
/// Mirrors the libsvm parameter block. A kernel `gamma` of zero means
/// `1 / number_of_features` and is resolved when training starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Problem formulation
    pub svm_type: SvmType,
    /// Kernel function and parameters
    pub kernel: Kernel,
    /// Regularization parameter (C-SVC, epsilon-SVR, nu-SVR)
    pub c: f64,
    /// nu parameter (nu-SVC, one-class, nu-SVR)
    pub nu: f64,
    /// Width of the epsilon-insensitive tube (epsilon-SVR)
    pub epsilon_loss: f64,
    /// Kernel cache size in megabytes
    pub cache_size: f64,
    /// Stopping tolerance of the solver
    pub tolerance: f64,
    /// Enable shrinking heuristic
    pub shrinking: bool,
    /// Fit probability estimates after training
    pub probability: bool,
    /// Per-class multipliers of C, keyed by class label
    pub class_weights: Vec<(i32, f64)>,
    /// Solver iteration cap; `None` uses `max(10_000_000, 100 * l)`
    pub max_iterations: Option<usize>,
    /// Seed of the cross-validation shuffle used for probability fitting
    pub seed: u64,
    /// Per-feature offset subtracted before training and prediction
    pub input_subtract: Option<Vec<f64>>,
    /// Per-feature divisor applied after the offset
    pub input_divide: Option<Vec<f64>>,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            svm_type: SvmType::CSvc,
            kernel: Kernel::Rbf { gamma: 0.0 },
            c: 1.0,
            nu: 0.5,
            epsilon_loss: 0.1,
            cache_size: 100.0,
            tolerance: 1e-3,
            shrinking: true,
            probability: false,
            class_weights: Vec::new(),
            max_iterations: None,
            seed: 1,
            input_subtract: None,
            input_divide: None,
        }
    }
}
