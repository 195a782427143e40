//! Polynomial Kernel Implementation
//!
//! The polynomial kernel is defined as:
//! K(x, y) = (γ * <x, y> + r)^d
//!
//! Where:
//! - γ (gamma): scaling factor for the dot product
//! - r (coef0): independent term in the polynomial
//! - d (degree): degree of the polynomial

use crate::core::SparseVector;
use crate::kernel::linear::dot;

/// Polynomial kernel value for the given parameters
pub fn evaluate(x: &SparseVector, y: &SparseVector, degree: i32, gamma: f64, coef0: f64) -> f64 {
    powi(gamma * dot(x, y) + coef0, degree)
}

/// Integer power by repeated squaring
///
/// Non-positive exponents yield 1.0. The multiplication order is part of the
/// model format contract: libsvm tools compute the same sequence of products.
pub fn powi(base: f64, times: i32) -> f64 {
    let mut tmp = base;
    let mut ret = 1.0;
    let mut t = times;

    while t > 0 {
        if t % 2 == 1 {
            ret *= tmp;
        }
        tmp *= tmp;
        t /= 2;
    }

    ret
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_powi() {
        assert_eq!(powi(2.0, 0), 1.0);
        assert_eq!(powi(2.0, 1), 2.0);
        assert_eq!(powi(2.0, 10), 1024.0);
        assert_eq!(powi(-1.5, 3), -3.375);
        assert_eq!(powi(3.0, -2), 1.0);
    }

    #[test]
    fn test_polynomial_kernel_quadratic() {
        let x = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![0, 1], vec![3.0, 4.0]);

        // (1 * 11 + 1)^2 = 144
        assert_eq!(evaluate(&x, &y, 2, 1.0, 1.0), 144.0);
    }

    #[test]
    fn test_polynomial_kernel_orthogonal() {
        let x = SparseVector::new(vec![0], vec![1.0]);
        let y = SparseVector::new(vec![1], vec![1.0]);

        // Only the independent term survives: 0.5^3
        assert_eq!(evaluate(&x, &y, 3, 2.0, 0.5), 0.125);
    }
}
