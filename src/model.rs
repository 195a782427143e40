//! Trained SVM model
//!
//! A [`Model`] is the plain-data artifact shared by the trainer, the
//! persistence formats and the [`Machine`](crate::Machine). Its constructor
//! checks the structural invariants once, so that prediction can index the
//! support vectors and coefficients without further validation.

use crate::core::{Result, SVMError, SparseVector, SvmType};
use crate::kernel::Kernel;
use std::collections::HashSet;

/// Support vector with its dual coefficients
///
/// For a k-class model every support vector carries `k - 1` coefficients,
/// one per pairwise classifier its class takes part in. One-class and
/// regression models carry exactly one.
#[derive(Debug, Clone, PartialEq)]
pub struct SupportVector {
    /// Feature vector (0-based indices)
    pub features: SparseVector,
    /// Coefficients `y_i α_i` per participating classifier
    pub coefficients: Vec<f64>,
}

impl SupportVector {
    pub fn new(features: SparseVector, coefficients: Vec<f64>) -> Self {
        Self {
            features,
            coefficients,
        }
    }

    /// Pairs `(opponent_class, coefficient)` for a vector of class `own`
    ///
    /// Coefficient slot `s` belongs to the classifier against class `s` when
    /// `s < own` and against class `s + 1` otherwise.
    pub fn participations(&self, own: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.coefficients
            .iter()
            .enumerate()
            .map(move |(slot, &c)| (if slot < own { slot } else { slot + 1 }, c))
    }
}

/// Everything needed to assemble a [`Model`]
#[derive(Debug, Clone)]
pub struct ModelParts {
    pub svm_type: SvmType,
    pub kernel: Kernel,
    pub input_size: usize,
    pub classes: Vec<i32>,
    pub sv_counts: Vec<usize>,
    pub support_vectors: Vec<SupportVector>,
    pub rho: Vec<f64>,
    pub prob_a: Option<Vec<f64>>,
    pub prob_b: Option<Vec<f64>>,
    /// Defaults to zeros when absent
    pub input_subtract: Option<Vec<f64>>,
    /// Defaults to ones when absent
    pub input_divide: Option<Vec<f64>>,
}

/// Trained SVM model
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    svm_type: SvmType,
    kernel: Kernel,
    input_size: usize,
    classes: Vec<i32>,
    sv_counts: Vec<usize>,
    sv_starts: Vec<usize>,
    support_vectors: Vec<SupportVector>,
    rho: Vec<f64>,
    prob_a: Option<Vec<f64>>,
    prob_b: Option<Vec<f64>>,
    input_subtract: Vec<f64>,
    input_divide: Vec<f64>,
}

fn format_error(message: impl Into<String>) -> SVMError {
    SVMError::FormatError(message.into())
}

impl Model {
    /// Assemble a model, checking its structural invariants
    pub fn new(parts: ModelParts) -> Result<Self> {
        let ModelParts {
            svm_type,
            kernel,
            input_size,
            classes,
            sv_counts,
            support_vectors,
            rho,
            prob_a,
            prob_b,
            input_subtract,
            input_divide,
        } = parts;

        if input_size == 0 {
            return Err(format_error("input size must be at least 1"));
        }

        let (n_coefficients, n_rho) = if svm_type.is_classification() {
            let k = classes.len();
            if k < 2 {
                return Err(format_error(format!(
                    "classification model needs at least 2 classes, got {}",
                    k
                )));
            }
            let unique: HashSet<i32> = classes.iter().copied().collect();
            if unique.len() != k {
                return Err(format_error("class labels must be unique"));
            }
            if sv_counts.len() != k {
                return Err(format_error(format!(
                    "expected {} support vector counts, got {}",
                    k,
                    sv_counts.len()
                )));
            }
            let total: usize = sv_counts.iter().sum();
            if total != support_vectors.len() {
                return Err(format_error(format!(
                    "support vector counts add up to {}, but {} support vectors are present",
                    total,
                    support_vectors.len()
                )));
            }
            (k - 1, k * (k - 1) / 2)
        } else {
            if !classes.is_empty() || !sv_counts.is_empty() {
                return Err(format_error(format!(
                    "{} model cannot carry class labels",
                    svm_type
                )));
            }
            (1, 1)
        };

        if rho.len() != n_rho {
            return Err(format_error(format!(
                "expected {} rho values, got {}",
                n_rho,
                rho.len()
            )));
        }

        for (i, sv) in support_vectors.iter().enumerate() {
            if sv.coefficients.len() != n_coefficients {
                return Err(format_error(format!(
                    "support vector {} has {} coefficients, expected {}",
                    i,
                    sv.coefficients.len(),
                    n_coefficients
                )));
            }
            if sv.features.dimension() > input_size {
                return Err(format_error(format!(
                    "support vector {} uses feature {} beyond input size {}",
                    i,
                    sv.features.dimension(),
                    input_size
                )));
            }
        }

        match (&prob_a, &prob_b) {
            (None, None) => {}
            (Some(a), Some(b)) if svm_type.is_classification() => {
                if a.len() != n_rho || b.len() != n_rho {
                    return Err(format_error(format!(
                        "expected {} probability parameters, got {} and {}",
                        n_rho,
                        a.len(),
                        b.len()
                    )));
                }
            }
            (Some(a), None) if svm_type.is_regression() => {
                if a.len() != 1 {
                    return Err(format_error("regression models carry a single probA"));
                }
            }
            _ => {
                return Err(format_error(format!(
                    "inconsistent probability parameters for a {} model",
                    svm_type
                )))
            }
        }

        let input_subtract = input_subtract.unwrap_or_else(|| vec![0.0; input_size]);
        let input_divide = input_divide.unwrap_or_else(|| vec![1.0; input_size]);
        check_normalization(&input_subtract, &input_divide, input_size)?;

        let mut sv_starts = Vec::with_capacity(sv_counts.len());
        let mut start = 0;
        for &count in &sv_counts {
            sv_starts.push(start);
            start += count;
        }

        Ok(Self {
            svm_type,
            kernel,
            input_size,
            classes,
            sv_counts,
            sv_starts,
            support_vectors,
            rho,
            prob_a,
            prob_b,
            input_subtract,
            input_divide,
        })
    }

    pub fn svm_type(&self) -> SvmType {
        self.svm_type
    }

    pub fn kernel(&self) -> &Kernel {
        &self.kernel
    }

    /// Number of input features expected by the model
    pub fn input_size(&self) -> usize {
        self.input_size
    }

    /// Number of decision values produced per input
    pub fn output_size(&self) -> usize {
        self.rho.len()
    }

    /// Class labels in model order (empty unless classification)
    pub fn classes(&self) -> &[i32] {
        &self.classes
    }

    /// Number of classes as written in the text format
    ///
    /// Regression and one-class models report 2.
    pub fn nr_class(&self) -> usize {
        if self.svm_type.is_classification() {
            self.classes.len()
        } else {
            2
        }
    }

    pub fn sv_counts(&self) -> &[usize] {
        &self.sv_counts
    }

    pub fn support_vectors(&self) -> &[SupportVector] {
        &self.support_vectors
    }

    pub fn rho(&self) -> &[f64] {
        &self.rho
    }

    pub fn prob_a(&self) -> Option<&[f64]> {
        self.prob_a.as_deref()
    }

    pub fn prob_b(&self) -> Option<&[f64]> {
        self.prob_b.as_deref()
    }

    /// True when the model can produce class probabilities
    pub fn supports_probability(&self) -> bool {
        self.svm_type.is_classification() && self.prob_a.is_some() && self.prob_b.is_some()
    }

    pub fn input_subtract(&self) -> &[f64] {
        &self.input_subtract
    }

    pub fn input_divide(&self) -> &[f64] {
        &self.input_divide
    }

    /// True when both normalization vectors are the identity
    pub fn has_identity_normalization(&self) -> bool {
        self.input_subtract.iter().all(|&v| v == 0.0) && self.input_divide.iter().all(|&v| v == 1.0)
    }

    pub fn set_input_subtract(&mut self, values: Vec<f64>) -> Result<()> {
        check_length(&values, self.input_size)?;
        self.input_subtract = values;
        Ok(())
    }

    pub fn set_input_divide(&mut self, values: Vec<f64>) -> Result<()> {
        check_length(&values, self.input_size)?;
        self.input_divide = values;
        Ok(())
    }

    /// Normalize a dense input and convert it to the sparse form
    ///
    /// Inputs longer than `input_size` are truncated.
    pub fn prepare_input(&self, x: &[f64]) -> Result<SparseVector> {
        if x.len() < self.input_size {
            return Err(SVMError::DimensionMismatch {
                expected: self.input_size,
                actual: x.len(),
            });
        }
        let normalized: Vec<f64> = x[..self.input_size]
            .iter()
            .zip(&self.input_subtract)
            .zip(&self.input_divide)
            .map(|((&v, &sub), &div)| (v - sub) / div)
            .collect();
        Ok(SparseVector::from_dense(&normalized))
    }

    /// Raw decision values for an already prepared input
    ///
    /// Classification models yield one value per class pair `(i, j)`,
    /// `i < j`, in lexicographic order; positive values favour class `i`.
    /// Other models yield a single value.
    pub fn decision_values(&self, x: &SparseVector) -> Vec<f64> {
        let kvalues: Vec<f64> = self
            .support_vectors
            .iter()
            .map(|sv| self.kernel.evaluate(x, &sv.features))
            .collect();

        if !self.svm_type.is_classification() {
            let mut sum = 0.0;
            for (sv, k) in self.support_vectors.iter().zip(&kvalues) {
                sum += sv.coefficients[0] * k;
            }
            return vec![sum - self.rho[0]];
        }

        let nr_class = self.classes.len();
        let mut values = Vec::with_capacity(self.rho.len());
        let mut p = 0;
        for i in 0..nr_class {
            for j in (i + 1)..nr_class {
                let block_i = self.sv_starts[i]..self.sv_starts[i] + self.sv_counts[i];
                let block_j = self.sv_starts[j]..self.sv_starts[j] + self.sv_counts[j];

                let mut sum = 0.0;
                for k in block_i {
                    sum += self.support_vectors[k].coefficients[j - 1] * kvalues[k];
                }
                for k in block_j {
                    sum += self.support_vectors[k].coefficients[i] * kvalues[k];
                }
                values.push(sum - self.rho[p]);
                p += 1;
            }
        }
        values
    }
}

fn check_length(values: &[f64], expected: usize) -> Result<()> {
    if values.len() != expected {
        return Err(SVMError::DimensionMismatch {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}

fn check_normalization(subtract: &[f64], divide: &[f64], input_size: usize) -> Result<()> {
    check_length(subtract, input_size)?;
    check_length(divide, input_size)?;
    if divide.iter().any(|&d| d == 0.0) {
        return Err(format_error("input divide vector contains a zero"));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Three-class linear model over two features
    ///
    /// One support vector per class, each at a unit axis position.
    pub(crate) fn three_class_model() -> Model {
        Model::new(ModelParts {
            svm_type: SvmType::CSvc,
            kernel: Kernel::Linear,
            input_size: 2,
            classes: vec![1, 2, 3],
            sv_counts: vec![1, 1, 1],
            support_vectors: vec![
                SupportVector::new(SparseVector::new(vec![0], vec![1.0]), vec![1.0, 1.0]),
                SupportVector::new(SparseVector::new(vec![1], vec![1.0]), vec![-1.0, 1.0]),
                SupportVector::new(
                    SparseVector::new(vec![0, 1], vec![-1.0, -1.0]),
                    vec![-1.0, -1.0],
                ),
            ],
            rho: vec![0.0, 0.0, 0.0],
            prob_a: None,
            prob_b: None,
            input_subtract: None,
            input_divide: None,
        })
        .unwrap()
    }

    #[test]
    fn test_participations() {
        let sv = SupportVector::new(SparseVector::empty(), vec![0.1, 0.2, 0.3]);
        let pairs: Vec<_> = sv.participations(1).collect();
        assert_eq!(pairs, vec![(0, 0.1), (2, 0.2), (3, 0.3)]);
    }

    #[test]
    fn test_decision_values_pairwise_order() {
        let model = three_class_model();
        let x = SparseVector::new(vec![0], vec![2.0]);
        let values = model.decision_values(&x);

        // K(x, sv) = [2, 0, -2]
        // (1,2): sv0 coef[0] * 2 + sv1 coef[0] * 0 = 2
        // (1,3): sv0 coef[1] * 2 + sv2 coef[0] * -2 = 4
        // (2,3): sv1 coef[1] * 0 + sv2 coef[1] * -2 = 2
        assert_eq!(values, vec![2.0, 4.0, 2.0]);
        assert_eq!(model.output_size(), 3);
    }

    #[test]
    fn test_prepare_input() {
        let mut model = three_class_model();
        model.set_input_subtract(vec![1.0, 0.0]).unwrap();
        model.set_input_divide(vec![2.0, 4.0]).unwrap();

        let x = model.prepare_input(&[1.0, 2.0, 99.0]).unwrap();
        // First entry normalizes to zero and is dropped; 99 is truncated
        assert_eq!(x.indices, vec![1]);
        assert_relative_eq!(x.values[0], 0.5);

        assert!(matches!(
            model.prepare_input(&[1.0]),
            Err(SVMError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        assert!(model.set_input_divide(vec![1.0]).is_err());
    }

    #[test]
    fn test_rejects_inconsistent_parts() {
        let base = ModelParts {
            svm_type: SvmType::CSvc,
            kernel: Kernel::Linear,
            input_size: 1,
            classes: vec![1, -1],
            sv_counts: vec![1, 1],
            support_vectors: vec![
                SupportVector::new(SparseVector::new(vec![0], vec![1.0]), vec![1.0]),
                SupportVector::new(SparseVector::new(vec![0], vec![-1.0]), vec![-1.0]),
            ],
            rho: vec![0.0],
            prob_a: None,
            prob_b: None,
            input_subtract: None,
            input_divide: None,
        };
        assert!(Model::new(base.clone()).is_ok());

        let mut parts = base.clone();
        parts.sv_counts = vec![2, 1];
        assert!(matches!(Model::new(parts), Err(SVMError::FormatError(_))));

        let mut parts = base.clone();
        parts.rho = vec![0.0, 1.0];
        assert!(Model::new(parts).is_err());

        let mut parts = base.clone();
        parts.classes = vec![1, 1];
        assert!(Model::new(parts).is_err());

        let mut parts = base.clone();
        parts.prob_a = Some(vec![1.0]);
        assert!(Model::new(parts).is_err());

        let mut parts = base;
        parts.input_divide = Some(vec![0.0]);
        assert!(Model::new(parts).is_err());
    }

    #[test]
    fn test_regression_model() {
        let model = Model::new(ModelParts {
            svm_type: SvmType::EpsilonSvr,
            kernel: Kernel::Linear,
            input_size: 1,
            classes: vec![],
            sv_counts: vec![],
            support_vectors: vec![SupportVector::new(
                SparseVector::new(vec![0], vec![1.0]),
                vec![2.0],
            )],
            rho: vec![-1.0],
            prob_a: Some(vec![0.3]),
            prob_b: None,
            input_subtract: None,
            input_divide: None,
        })
        .unwrap();

        assert_eq!(model.decision_values(&SparseVector::new(vec![0], vec![3.0])), vec![7.0]);
        assert_eq!(model.nr_class(), 2);
        assert!(!model.supports_probability());
        assert!(model.has_identity_normalization());
    }
}
