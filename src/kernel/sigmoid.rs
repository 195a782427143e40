//! Sigmoid (hyperbolic tangent) kernel
//!
//! K(x, y) = tanh(γ * <x, y> + coef0)
//!
//! Not positive semi-definite for every parameter choice; the solver copes
//! with non-positive curvature through its TAU safeguard.

use crate::core::SparseVector;
use crate::kernel::linear::dot;

/// Sigmoid kernel value for the given parameters
pub fn evaluate(x: &SparseVector, y: &SparseVector, gamma: f64, coef0: f64) -> f64 {
    (gamma * dot(x, y) + coef0).tanh()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sigmoid_range() {
        let x = SparseVector::new(vec![0, 1], vec![10.0, 10.0]);
        let y = SparseVector::new(vec![0, 1], vec![10.0, -10.0]);

        let v = evaluate(&x, &x, 1.0, 0.0);
        assert!(v > 0.999 && v <= 1.0);
        assert_eq!(evaluate(&x, &y, 1.0, 0.0), 0.0);
    }

    #[test]
    fn test_sigmoid_coef0_shift() {
        let x = SparseVector::empty();
        assert_relative_eq!(evaluate(&x, &x, 1.0, -0.5), (-0.5f64).tanh(), epsilon = 1e-15);
    }
}
