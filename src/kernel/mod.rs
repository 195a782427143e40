//! Kernel functions for SVM
//!
//! Every kernel family libsvm models can carry is a variant of [`Kernel`];
//! the per-family arithmetic lives in its own submodule.

pub mod linear;
pub mod polynomial;
pub mod rbf;
pub mod sigmoid;

pub use self::linear::dot;
pub use self::polynomial::powi;
pub use self::rbf::squared_distance;

use crate::core::{Result, SVMError, SparseVector};
use serde::{Deserialize, Serialize};

/// Kernel function with its parameters
///
/// A `gamma` of zero inside a trainer configuration stands for
/// `1 / number_of_features` and is resolved before training starts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Kernel {
    /// K(x, y) = x·y
    Linear,
    /// K(x, y) = (γ x·y + coef0)^degree
    Polynomial { degree: i32, gamma: f64, coef0: f64 },
    /// K(x, y) = exp(-γ ‖x - y‖²)
    Rbf { gamma: f64 },
    /// K(x, y) = tanh(γ x·y + coef0)
    Sigmoid { gamma: f64, coef0: f64 },
}

impl Kernel {
    /// Compute kernel value K(x, y)
    pub fn evaluate(&self, x: &SparseVector, y: &SparseVector) -> f64 {
        match *self {
            Kernel::Linear => linear::evaluate(x, y),
            Kernel::Polynomial {
                degree,
                gamma,
                coef0,
            } => polynomial::evaluate(x, y, degree, gamma, coef0),
            Kernel::Rbf { gamma } => rbf::evaluate(x, y, gamma),
            Kernel::Sigmoid { gamma, coef0 } => sigmoid::evaluate(x, y, gamma, coef0),
        }
    }

    /// Compute K(x, y) from precomputed squared norms
    ///
    /// Only RBF uses the norms (‖x‖² + ‖y‖² - 2 x·y); this is the form the
    /// solver evaluates during training.
    pub fn evaluate_with_norms(
        &self,
        x: &SparseVector,
        y: &SparseVector,
        x_norm_sq: f64,
        y_norm_sq: f64,
    ) -> f64 {
        match *self {
            Kernel::Rbf { gamma } => rbf::evaluate_with_norms(x, y, gamma, x_norm_sq, y_norm_sq),
            _ => self.evaluate(x, y),
        }
    }

    /// Token used by the libsvm text model format
    pub fn name(&self) -> &'static str {
        match self {
            Kernel::Linear => "linear",
            Kernel::Polynomial { .. } => "polynomial",
            Kernel::Rbf { .. } => "rbf",
            Kernel::Sigmoid { .. } => "sigmoid",
        }
    }

    /// Gamma parameter, if the family has one
    pub fn gamma(&self) -> Option<f64> {
        match *self {
            Kernel::Linear => None,
            Kernel::Polynomial { gamma, .. }
            | Kernel::Rbf { gamma }
            | Kernel::Sigmoid { gamma, .. } => Some(gamma),
        }
    }

    /// Polynomial degree, if the family has one
    pub fn degree(&self) -> Option<i32> {
        match *self {
            Kernel::Polynomial { degree, .. } => Some(degree),
            _ => None,
        }
    }

    /// Independent term, if the family has one
    pub fn coef0(&self) -> Option<f64> {
        match *self {
            Kernel::Polynomial { coef0, .. } | Kernel::Sigmoid { coef0, .. } => Some(coef0),
            _ => None,
        }
    }

    /// Same kernel with gamma replaced (no-op for linear)
    pub fn with_gamma(self, new_gamma: f64) -> Self {
        match self {
            Kernel::Linear => Kernel::Linear,
            Kernel::Polynomial { degree, coef0, .. } => Kernel::Polynomial {
                degree,
                gamma: new_gamma,
                coef0,
            },
            Kernel::Rbf { .. } => Kernel::Rbf { gamma: new_gamma },
            Kernel::Sigmoid { coef0, .. } => Kernel::Sigmoid {
                gamma: new_gamma,
                coef0,
            },
        }
    }

    /// Build a kernel from its libsvm token and parameters
    pub fn from_parts(name: &str, degree: i32, gamma: f64, coef0: f64) -> Result<Self> {
        match name {
            "linear" => Ok(Kernel::Linear),
            "polynomial" => Ok(Kernel::Polynomial {
                degree,
                gamma,
                coef0,
            }),
            "rbf" => Ok(Kernel::Rbf { gamma }),
            "sigmoid" => Ok(Kernel::Sigmoid { gamma, coef0 }),
            "precomputed" => Err(SVMError::FormatError(
                "precomputed kernels are not supported".to_string(),
            )),
            other => Err(SVMError::FormatError(format!(
                "unknown kernel type: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair() -> (SparseVector, SparseVector) {
        (
            SparseVector::new(vec![0, 2], vec![1.0, 2.0]),
            SparseVector::new(vec![0, 1], vec![3.0, 1.0]),
        )
    }

    #[test]
    fn test_dispatch_matches_formulas() {
        let (x, y) = pair();
        // x·y = 3, ‖x - y‖² = 4 + 1 + 4 = 9
        assert_eq!(Kernel::Linear.evaluate(&x, &y), 3.0);
        assert_eq!(
            Kernel::Polynomial {
                degree: 2,
                gamma: 0.5,
                coef0: 1.0
            }
            .evaluate(&x, &y),
            6.25
        );
        assert_relative_eq!(
            Kernel::Rbf { gamma: 0.1 }.evaluate(&x, &y),
            (-0.9f64).exp(),
            epsilon = 1e-15
        );
        assert_relative_eq!(
            Kernel::Sigmoid {
                gamma: 0.2,
                coef0: -0.1
            }
            .evaluate(&x, &y),
            0.5f64.tanh(),
            epsilon = 1e-15
        );
    }

    #[test]
    fn test_norm_form_agrees_with_merge_form() {
        let (x, y) = pair();
        let k = Kernel::Rbf { gamma: 0.3 };
        let direct = k.evaluate(&x, &y);
        let with_norms = k.evaluate_with_norms(&x, &y, dot(&x, &x), dot(&y, &y));
        assert_relative_eq!(direct, with_norms, epsilon = 1e-12);
    }

    #[test]
    fn test_parameter_accessors() {
        let k = Kernel::Polynomial {
            degree: 3,
            gamma: 0.25,
            coef0: 1.0,
        };
        assert_eq!(k.degree(), Some(3));
        assert_eq!(k.gamma(), Some(0.25));
        assert_eq!(k.coef0(), Some(1.0));
        assert_eq!(Kernel::Linear.gamma(), None);
        assert_eq!(Kernel::Rbf { gamma: 1.0 }.coef0(), None);
        assert_eq!(
            Kernel::Rbf { gamma: 0.0 }.with_gamma(0.5),
            Kernel::Rbf { gamma: 0.5 }
        );
    }

    #[test]
    fn test_from_parts() {
        assert_eq!(
            Kernel::from_parts("rbf", 0, 0.5, 0.0).unwrap(),
            Kernel::Rbf { gamma: 0.5 }
        );
        assert!(matches!(
            Kernel::from_parts("precomputed", 0, 0.0, 0.0),
            Err(SVMError::FormatError(_))
        ));
        assert!(Kernel::from_parts("laplacian", 0, 0.0, 0.0).is_err());
    }
}
