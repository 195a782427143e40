//! Gaussian kernel, K(x, y) = exp(-γ ‖x - y‖²)

use crate::core::SparseVector;
use crate::kernel::linear::dot;
use std::cmp::Ordering;

/// Kernel value from the explicit squared distance, as used for prediction
pub fn evaluate(x: &SparseVector, y: &SparseVector, gamma: f64) -> f64 {
    (-gamma * squared_distance(x, y)).exp()
}

/// Kernel value computed as exp(-γ (‖x‖² + ‖y‖² - 2 x·y))
///
/// This is the form used by the solver, which caches the squared norms.
/// The distance is not clamped at zero.
pub fn evaluate_with_norms(
    x: &SparseVector,
    y: &SparseVector,
    gamma: f64,
    x_norm_sq: f64,
    y_norm_sq: f64,
) -> f64 {
    (-gamma * (x_norm_sq + y_norm_sq - 2.0 * dot(x, y))).exp()
}

/// ‖x - y‖² over the union of both supports
///
/// An index present in only one vector contributes its value squared.
pub fn squared_distance(x: &SparseVector, y: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;

    while i < x.indices.len() && j < y.indices.len() {
        match x.indices[i].cmp(&y.indices[j]) {
            Ordering::Equal => {
                let d = x.values[i] - y.values[j];
                sum += d * d;
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                sum += x.values[i] * x.values[i];
                i += 1;
            }
            Ordering::Greater => {
                sum += y.values[j] * y.values[j];
                j += 1;
            }
        }
    }

    sum + x.values[i..].iter().chain(&y.values[j..]).map(|v| v * v).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_rbf_identical_vectors() {
        let x = SparseVector::new(vec![0, 3], vec![0.7, -1.2]);
        assert_eq!(evaluate(&x, &x, 2.5), 1.0);
    }

    #[test]
    fn test_squared_distance_disjoint_support() {
        let x = SparseVector::new(vec![0, 2], vec![1.0, 2.0]);
        let y = SparseVector::new(vec![1, 5], vec![3.0, 4.0]);

        // Nothing overlaps: 1 + 4 + 9 + 16
        assert_eq!(squared_distance(&x, &y), 30.0);
        assert_eq!(squared_distance(&y, &x), 30.0);
    }

    #[test]
    fn test_squared_distance_against_empty() {
        let x = SparseVector::new(vec![4], vec![3.0]);
        assert_eq!(squared_distance(&x, &SparseVector::empty()), 9.0);
    }

    #[test]
    fn test_rbf_value() {
        let x = SparseVector::new(vec![0], vec![1.0]);
        let y = SparseVector::new(vec![0], vec![3.0]);

        assert_relative_eq!(evaluate(&x, &y, 0.5), (-2.0f64).exp(), epsilon = 1e-15);
        assert_relative_eq!(
            evaluate_with_norms(&x, &y, 0.5, 1.0, 9.0),
            (-2.0f64).exp(),
            epsilon = 1e-15
        );
    }
}
