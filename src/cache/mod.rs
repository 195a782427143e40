//! Kernel cache implementation
//!
//! Provides an LRU cache of Q-matrix columns to avoid redundant kernel
//! evaluations in the SMO solver. Columns may be partially filled: a column
//! requested with length `len` keeps its first `len` entries and is extended
//! on demand when a longer prefix is needed later.

use lru::LruCache;

/// Storage type of cached Q-matrix entries
///
/// Single precision halves the memory footprint; libsvm makes the same
/// trade-off, so keeping it preserves numerical parity of trained models.
pub type Qfloat = f32;

/// LRU cache for Q-matrix columns with a memory budget
pub struct KernelCache {
    columns: LruCache<usize, Vec<Qfloat>>,
    /// Budget in number of `Qfloat` entries
    capacity: usize,
    /// Entries currently held
    used: usize,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a new cache for `n_columns` columns holding at most `capacity` entries
    ///
    /// At least two full columns always fit, since the solver works on pairs.
    pub fn new(n_columns: usize, capacity: usize) -> Self {
        Self {
            columns: LruCache::unbounded(),
            capacity: capacity.max(2 * n_columns),
            used: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache whose budget is given in megabytes
    pub fn with_memory_limit(n_columns: usize, megabytes: f64) -> Self {
        let bytes = (megabytes * 1_048_576.0) as usize;
        Self::new(n_columns, bytes / std::mem::size_of::<Qfloat>())
    }

    /// Fetch column `index` with at least `len` entries
    ///
    /// Returns the column slice and the number of entries that were already
    /// valid; the caller must fill `start..len`.
    pub fn get_data(&mut self, index: usize, len: usize) -> (&mut [Qfloat], usize) {
        let start = self.columns.peek(&index).map_or(0, Vec::len);

        if start < len {
            self.misses += 1;
            let extra = len - start;

            // Take the column out so eviction cannot drop it
            let mut column = self.columns.pop(&index).unwrap_or_default();
            while self.used + extra > self.capacity {
                match self.columns.pop_lru() {
                    Some((_, evicted)) => self.used -= evicted.len(),
                    None => break,
                }
            }
            column.resize(len, 0.0);
            self.used += extra;
            self.columns.put(index, column);
        } else {
            self.hits += 1;
        }

        let column = self.columns.get_or_insert_mut(index, Vec::new);
        (&mut column[..len], start.min(len))
    }

    /// Exchange the roles of indices `i` and `j`
    ///
    /// Columns `i` and `j` trade places, and every cached column swaps its
    /// entries `i` and `j`. A column that only covers one of the two entries
    /// cannot be fixed up and is dropped.
    pub fn swap_index(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        let column_i = self.columns.pop(&i);
        let column_j = self.columns.pop(&j);
        if let Some(column) = column_i {
            self.columns.put(j, column);
        }
        if let Some(column) = column_j {
            self.columns.put(i, column);
        }

        let (low, high) = if i < j { (i, j) } else { (j, i) };
        let mut stale = Vec::new();
        for (&key, column) in self.columns.iter_mut() {
            if column.len() > low {
                if column.len() > high {
                    column.swap(low, high);
                } else {
                    stale.push(key);
                }
            }
        }
        for key in stale {
            if let Some(column) = self.columns.pop(&key) {
                self.used -= column.len();
            }
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.capacity,
            size: self.used,
            columns: self.columns.len(),
        }
    }
}

/// Cache statistics
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    /// Budget in entries
    pub capacity: usize,
    /// Entries in use
    pub size: usize,
    /// Number of cached columns
    pub columns: usize,
}

impl CacheStats {
    /// Fraction of column requests served without computing a kernel value
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(cache: &mut KernelCache, index: usize, len: usize) -> usize {
        let (data, start) = cache.get_data(index, len);
        for (j, value) in data.iter_mut().enumerate().skip(start) {
            *value = (index * 100 + j) as Qfloat;
        }
        start
    }

    #[test]
    fn test_column_fill_and_hit() {
        let mut cache = KernelCache::new(4, 100);

        assert_eq!(fill(&mut cache, 1, 4), 0);
        assert_eq!(cache.stats().misses, 1);

        let (data, start) = cache.get_data(1, 4);
        assert_eq!(start, 4);
        assert_eq!(data, &[100.0, 101.0, 102.0, 103.0]);
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn test_partial_column_is_extended() {
        let mut cache = KernelCache::new(6, 100);

        assert_eq!(fill(&mut cache, 0, 2), 0);
        // Only entries 2..5 need computing
        assert_eq!(fill(&mut cache, 0, 5), 2);
        let (data, _) = cache.get_data(0, 5);
        assert_eq!(data, &[0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(cache.stats().size, 5);
    }

    #[test]
    fn test_lru_eviction_respects_budget() {
        // Budget is raised to two full columns
        let mut cache = KernelCache::new(3, 1);
        assert_eq!(cache.stats().capacity, 6);

        fill(&mut cache, 0, 3);
        fill(&mut cache, 1, 3);
        fill(&mut cache, 2, 3); // evicts column 0

        assert_eq!(cache.stats().columns, 2);
        assert!(cache.stats().size <= 6);
        assert_eq!(fill(&mut cache, 0, 3), 0);
    }

    #[test]
    fn test_swap_index() {
        let mut cache = KernelCache::new(4, 100);
        fill(&mut cache, 0, 4);
        fill(&mut cache, 3, 4);
        fill(&mut cache, 2, 2); // only covers entry 1 of the pair (1, 3)

        cache.swap_index(1, 3);

        // Column 3 moved to key 1, its entries 1 and 3 exchanged
        let (data, start) = cache.get_data(1, 4);
        assert_eq!(start, 4);
        assert_eq!(data, &[300.0, 303.0, 302.0, 301.0]);

        let (data, _) = cache.get_data(0, 4);
        assert_eq!(data, &[0.0, 3.0, 2.0, 1.0]);

        // The short column was dropped
        assert_eq!(cache.get_data(2, 2).1, 0);
    }

    #[test]
    fn test_hit_rate_calculation() {
        let mut cache = KernelCache::new(2, 10);
        assert_eq!(cache.stats().hit_rate(), 0.0);

        fill(&mut cache, 0, 2);
        fill(&mut cache, 0, 2);
        assert_eq!(cache.stats().hit_rate(), 0.5);
    }

    #[test]
    fn test_cache_with_memory_limit() {
        let cache = KernelCache::with_memory_limit(10, 1.0);
        assert_eq!(cache.stats().capacity, 262_144);
    }
}
