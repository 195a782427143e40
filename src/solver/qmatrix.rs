//! Q matrices consumed by the SMO solver
//!
//! The dual problem's quadratic term is `Q[i][j] = y_i y_j K(x_i, x_j)` for
//! classification, `K(x_i, x_j)` for one-class, and a signed 2l x 2l
//! expansion of K for regression. Columns are computed lazily through the
//! kernel cache.

use crate::cache::{CacheStats, KernelCache, Qfloat};
use crate::core::SparseVector;
use crate::kernel::{dot, Kernel};

/// Column access to a Q matrix
pub trait QMatrix {
    /// Column `i`, at least the first `len` entries
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat];

    /// Diagonal `QD[i] = Q[i][i]`
    fn get_qd(&self) -> &[f64];

    /// Exchange indices `i` and `j` in all internal state
    fn swap_index(&mut self, i: usize, j: usize);

    /// Counters of the column cache behind this matrix
    fn cache_stats(&self) -> CacheStats;
}

/// Kernel over the training vectors, indexed by position
///
/// Keeps `‖x_i‖²` for RBF so that K(i, j) needs a single dot product.
pub struct KernelMatrix<'a> {
    kernel: Kernel,
    x: Vec<&'a SparseVector>,
    x_square: Option<Vec<f64>>,
}

impl<'a> KernelMatrix<'a> {
    pub fn new(x: &[&'a SparseVector], kernel: Kernel) -> Self {
        let x = x.to_vec();
        let x_square = match kernel {
            Kernel::Rbf { .. } => Some(x.iter().map(|v| dot(v, v)).collect()),
            _ => None,
        };
        Self {
            kernel,
            x,
            x_square,
        }
    }

    pub fn evaluate(&self, i: usize, j: usize) -> f64 {
        match &self.x_square {
            Some(sq) => self
                .kernel
                .evaluate_with_norms(self.x[i], self.x[j], sq[i], sq[j]),
            None => self.kernel.evaluate(self.x[i], self.x[j]),
        }
    }

    pub fn swap_index(&mut self, i: usize, j: usize) {
        self.x.swap(i, j);
        if let Some(sq) = self.x_square.as_mut() {
            sq.swap(i, j);
        }
    }
}

/// Q matrix for C-SVC and nu-SVC
pub struct SvcQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    y: Vec<i8>,
    qd: Vec<f64>,
}

impl<'a> SvcQ<'a> {
    pub fn new(x: &[&'a SparseVector], y: &[i8], kernel: Kernel, cache_size: f64) -> Self {
        let kernel = KernelMatrix::new(x, kernel);
        let qd = (0..x.len()).map(|i| kernel.evaluate(i, i)).collect();
        Self {
            kernel,
            cache: KernelCache::with_memory_limit(x.len(), cache_size),
            y: y.to_vec(),
            qd,
        }
    }
}

impl QMatrix for SvcQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat] {
        let (data, start) = self.cache.get_data(i, len);
        for j in start..len {
            let sign = f64::from(self.y[i] * self.y[j]);
            data[j] = (sign * self.kernel.evaluate(i, j)) as Qfloat;
        }
        data
    }

    fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.kernel.swap_index(i, j);
        self.y.swap(i, j);
        self.qd.swap(i, j);
    }
}

/// Q matrix for one-class SVM
pub struct OneClassQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    qd: Vec<f64>,
}

impl<'a> OneClassQ<'a> {
    pub fn new(x: &[&'a SparseVector], kernel: Kernel, cache_size: f64) -> Self {
        let kernel = KernelMatrix::new(x, kernel);
        let qd = (0..x.len()).map(|i| kernel.evaluate(i, i)).collect();
        Self {
            kernel,
            cache: KernelCache::with_memory_limit(x.len(), cache_size),
            qd,
        }
    }
}

impl QMatrix for OneClassQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat] {
        let (data, start) = self.cache.get_data(i, len);
        for j in start..len {
            data[j] = self.kernel.evaluate(i, j) as Qfloat;
        }
        data
    }

    fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.cache.swap_index(i, j);
        self.kernel.swap_index(i, j);
        self.qd.swap(i, j);
    }
}

/// Q matrix for epsilon-SVR and nu-SVR
///
/// Variables `k` and `k + l` both refer to training vector `k`, with signs
/// +1 and -1. The cache stores full kernel rows of the `l` real vectors;
/// swaps only permute the sign/index indirection.
pub struct SvrQ<'a> {
    kernel: KernelMatrix<'a>,
    cache: KernelCache,
    l: usize,
    sign: Vec<i8>,
    index: Vec<usize>,
    qd: Vec<f64>,
    buffer: Vec<Qfloat>,
}

impl<'a> SvrQ<'a> {
    pub fn new(x: &[&'a SparseVector], kernel: Kernel, cache_size: f64) -> Self {
        let l = x.len();
        let kernel = KernelMatrix::new(x, kernel);

        let mut sign = vec![0i8; 2 * l];
        let mut index = vec![0usize; 2 * l];
        let mut qd = vec![0.0; 2 * l];
        for k in 0..l {
            sign[k] = 1;
            sign[k + l] = -1;
            index[k] = k;
            index[k + l] = k;
            qd[k] = kernel.evaluate(k, k);
            qd[k + l] = qd[k];
        }

        Self {
            kernel,
            cache: KernelCache::with_memory_limit(l, cache_size),
            l,
            sign,
            index,
            qd,
            buffer: vec![0.0; 2 * l],
        }
    }
}

impl QMatrix for SvrQ<'_> {
    fn get_q(&mut self, i: usize, len: usize) -> &[Qfloat] {
        let real_i = self.index[i];
        let (data, start) = self.cache.get_data(real_i, self.l);
        for j in start..self.l {
            data[j] = self.kernel.evaluate(real_i, j) as Qfloat;
        }

        let si = Qfloat::from(self.sign[i]);
        for j in 0..len {
            self.buffer[j] = si * Qfloat::from(self.sign[j]) * data[self.index[j]];
        }
        &self.buffer[..len]
    }

    fn get_qd(&self) -> &[f64] {
        &self.qd
    }

    fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    fn swap_index(&mut self, i: usize, j: usize) {
        self.sign.swap(i, j);
        self.index.swap(i, j);
        self.qd.swap(i, j);
    }
}
