//! Plain inner product kernel

use crate::core::SparseVector;
use std::cmp::Ordering;

/// K(x, y) = x·y
pub fn evaluate(x: &SparseVector, y: &SparseVector) -> f64 {
    dot(x, y)
}

/// Sparse inner product over two index-sorted vectors
///
/// Indices missing from either side count as zero, so vectors of
/// different widths can be mixed freely.
pub fn dot(x: &SparseVector, y: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut sum = 0.0;

    while i < x.indices.len() && j < y.indices.len() {
        match x.indices[i].cmp(&y.indices[j]) {
            Ordering::Equal => {
                sum += x.values[i] * y.values[j];
                i += 1;
                j += 1;
            }
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
        }
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linear_kernel_basic() {
        let x = SparseVector::new(vec![0, 2, 4], vec![1.0, 2.0, 3.0]);
        let y = SparseVector::new(vec![1, 2, 3], vec![1.0, 2.0, 3.0]);

        // Only index 2 overlaps: 2.0 * 2.0 = 4.0
        assert_eq!(evaluate(&x, &y), 4.0);
    }

    #[test]
    fn test_linear_kernel_identical() {
        let x = SparseVector::new(vec![0, 1, 2], vec![1.0, 2.0, 3.0]);

        // x^T * x = 1^2 + 2^2 + 3^2 = 14
        assert_eq!(evaluate(&x, &x), 14.0);
    }

    #[test]
    fn test_dot_mismatched_lengths() {
        let short = SparseVector::new(vec![0], vec![2.0]);
        let long = SparseVector::new(vec![0, 7, 100], vec![3.0, 1.0, 5.0]);

        assert_eq!(dot(&short, &long), 6.0);
        assert_eq!(dot(&long, &short), 6.0);
    }

    #[test]
    fn test_dot_product_empty() {
        let x = SparseVector::empty();
        let y = SparseVector::new(vec![0, 1], vec![1.0, 2.0]);

        assert_eq!(dot(&x, &y), 0.0);
        assert_eq!(dot(&y, &x), 0.0);
    }
}
