//! Training data access

use crate::core::Sample;

/// Labelled samples a [`Trainer`](crate::Trainer) can learn from
pub trait Dataset: Send + Sync {
    fn len(&self) -> usize;

    /// Width of the widest sample
    fn dim(&self) -> usize;

    /// Sample `i`, cloned out of the set
    ///
    /// # Panics
    /// Panics if `i >= len()`
    fn get_sample(&self, i: usize) -> Sample;

    fn get_batch(&self, indices: &[usize]) -> Vec<Sample> {
        indices.iter().map(|&i| self.get_sample(i)).collect()
    }

    /// Labels or regression targets in sample order
    fn get_labels(&self) -> Vec<f64>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
