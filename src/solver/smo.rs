//! Sequential Minimal Optimization (SMO) solver implementation
//!
//! Solves the generic dual problem
//!
//! ```text
//! min 0.5 αᵀQα + pᵀα
//! s.t. yᵀα = Δ, y_i = ±1, 0 ≤ α_i ≤ C_i
//! ```
//!
//! with second-order working-set selection (Fan, Chen and Lin, 2005). The
//! nu variant adds the constraint eᵀα = const and selects pairs within one
//! label class.

use crate::cache::Qfloat;
use crate::core::{Result, SVMError};
use crate::solver::qmatrix::QMatrix;
use log::debug;

/// Curvature floor for non positive-definite kernels
pub const TAU: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum AlphaStatus {
    LowerBound,
    UpperBound,
    Free,
}

/// Which dual problem the solver handles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverVariant {
    /// C-SVC, one-class and epsilon-SVR
    Standard,
    /// nu-SVC and nu-SVR
    Nu,
}

/// Stopping and heuristic parameters
#[derive(Debug, Clone, Copy)]
pub struct SolverConfig {
    /// Stopping tolerance on the maximal violating pair
    pub eps: f64,
    /// Enable the shrinking heuristic
    pub shrinking: bool,
    /// Iteration cap; `None` uses `max(10_000_000, 100 * l)`
    pub max_iterations: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            eps: 1e-3,
            shrinking: true,
            max_iterations: None,
        }
    }
}

/// Result of one solver run
#[derive(Debug, Clone, Default)]
pub struct SolutionInfo {
    /// Dual objective value
    pub obj: f64,
    /// Bias of the decision function
    pub rho: f64,
    pub upper_bound_p: f64,
    pub upper_bound_n: f64,
    /// Extra offset computed by the nu variant
    pub r: f64,
    pub iterations: usize,
}

/// SMO solver state
///
/// Indices below `active_size` are the active (unshrunk) variables. All
/// per-variable arrays are permuted together by [`Solver::swap_index`];
/// `active_set` maps positions back to the caller's order.
pub struct Solver<'a> {
    pub(super) variant: SolverVariant,
    pub(super) active_size: usize,
    pub(super) y: Vec<i8>,
    /// Gradient of the objective
    pub(super) g: Vec<f64>,
    pub(super) alpha_status: Vec<AlphaStatus>,
    pub(super) alpha: Vec<f64>,
    pub(super) q: Box<dyn QMatrix + 'a>,
    pub(super) eps: f64,
    pub(super) cp: f64,
    pub(super) cn: f64,
    pub(super) p: Vec<f64>,
    pub(super) active_set: Vec<usize>,
    /// Gradient contribution of variables at the upper bound
    pub(super) g_bar: Vec<f64>,
    pub(super) l: usize,
    pub(super) unshrink: bool,
    column_i: Vec<Qfloat>,
    column_j: Vec<Qfloat>,
}

impl<'a> Solver<'a> {
    /// Run the solver
    ///
    /// `alpha` holds a feasible starting point on entry and the solution on
    /// return, in the caller's original order.
    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        variant: SolverVariant,
        q: Box<dyn QMatrix + 'a>,
        p: &[f64],
        y: &[i8],
        alpha: &mut [f64],
        cp: f64,
        cn: f64,
        config: &SolverConfig,
    ) -> Result<SolutionInfo> {
        let l = y.len();
        let mut solver = Solver {
            variant,
            active_size: l,
            y: y.to_vec(),
            g: vec![0.0; l],
            alpha_status: vec![AlphaStatus::LowerBound; l],
            alpha: alpha.to_vec(),
            q,
            eps: config.eps,
            cp,
            cn,
            p: p.to_vec(),
            active_set: (0..l).collect(),
            g_bar: vec![0.0; l],
            l,
            unshrink: false,
            column_i: Vec::with_capacity(l),
            column_j: Vec::with_capacity(l),
        };

        for i in 0..l {
            solver.update_alpha_status(i);
        }
        solver.initialize_gradient();

        let iterations = solver.optimize(config)?;

        let (rho, r) = solver.calculate_rho();

        let mut v = 0.0;
        for i in 0..l {
            v += solver.alpha[i] * (solver.g[i] + solver.p[i]);
        }

        for i in 0..l {
            alpha[solver.active_set[i]] = solver.alpha[i];
        }

        debug!("optimization finished, #iter = {}", iterations);
        let stats = solver.q.cache_stats();
        debug!(
            "kernel cache: {} columns, {} of {} entries, hit rate {:.3}",
            stats.columns,
            stats.size,
            stats.capacity,
            stats.hit_rate()
        );

        Ok(SolutionInfo {
            obj: v / 2.0,
            rho,
            upper_bound_p: cp,
            upper_bound_n: cn,
            r,
            iterations,
        })
    }

    fn initialize_gradient(&mut self) {
        let l = self.l;
        self.g.copy_from_slice(&self.p);
        self.g_bar.iter_mut().for_each(|v| *v = 0.0);

        let mut column = std::mem::take(&mut self.column_i);
        for i in 0..l {
            if !self.is_lower_bound(i) {
                self.load_column(i, l, &mut column);
                let alpha_i = self.alpha[i];
                for j in 0..l {
                    self.g[j] += alpha_i * f64::from(column[j]);
                }
                if self.is_upper_bound(i) {
                    let c_i = self.get_c(i);
                    for j in 0..l {
                        self.g_bar[j] += c_i * f64::from(column[j]);
                    }
                }
            }
        }
        self.column_i = column;
    }

    /// Main loop; returns the number of iterations performed
    fn optimize(&mut self, config: &SolverConfig) -> Result<usize> {
        let l = self.l;
        let max_iter = config
            .max_iterations
            .unwrap_or_else(|| 10_000_000usize.max(l.saturating_mul(100)));
        let mut counter = l.min(1000) + 1;
        let mut iter = 0;

        while iter < max_iter {
            counter -= 1;
            if counter == 0 {
                counter = l.min(1000);
                if config.shrinking {
                    self.do_shrinking();
                }
                debug!("shrinking pass, active size {}", self.active_size);
            }

            let (i, j) = match self.select_working_set() {
                Some(pair) => pair,
                None => {
                    // Optimal on the active set; check the full problem
                    self.reconstruct_gradient();
                    self.active_size = l;
                    match self.select_working_set() {
                        Some(pair) => {
                            counter = 1;
                            pair
                        }
                        None => break,
                    }
                }
            };

            iter += 1;
            self.update_pair(i, j);
        }

        if iter >= max_iter {
            if self.active_size < l {
                self.reconstruct_gradient();
                self.active_size = l;
            }
            return Err(SVMError::ConvergenceError(format!(
                "reached the maximum number of iterations ({})",
                max_iter
            )));
        }

        Ok(iter)
    }

    /// Solve the two-variable sub-problem on (i, j) and update the gradients
    fn update_pair(&mut self, i: usize, j: usize) {
        let active_size = self.active_size;
        let mut q_i = std::mem::take(&mut self.column_i);
        let mut q_j = std::mem::take(&mut self.column_j);
        self.load_column(i, active_size, &mut q_i);
        self.load_column(j, active_size, &mut q_j);

        let (qd_i, qd_j) = {
            let qd = self.q.get_qd();
            (qd[i], qd[j])
        };
        let c_i = self.get_c(i);
        let c_j = self.get_c(j);

        let old_alpha_i = self.alpha[i];
        let old_alpha_j = self.alpha[j];
        let alpha = &mut self.alpha;
        let g = &self.g;
        let q_ij = f64::from(q_i[j]);

        if self.y[i] != self.y[j] {
            let mut quad_coef = qd_i + qd_j + 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (-g[i] - g[j]) / quad_coef;
            let diff = alpha[i] - alpha[j];
            alpha[i] += delta;
            alpha[j] += delta;

            if diff > 0.0 {
                if alpha[j] < 0.0 {
                    alpha[j] = 0.0;
                    alpha[i] = diff;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = -diff;
            }
            if diff > c_i - c_j {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = c_i - diff;
                }
            } else if alpha[j] > c_j {
                alpha[j] = c_j;
                alpha[i] = c_j + diff;
            }
        } else {
            let mut quad_coef = qd_i + qd_j - 2.0 * q_ij;
            if quad_coef <= 0.0 {
                quad_coef = TAU;
            }
            let delta = (g[i] - g[j]) / quad_coef;
            let sum = alpha[i] + alpha[j];
            alpha[i] -= delta;
            alpha[j] += delta;

            if sum > c_i {
                if alpha[i] > c_i {
                    alpha[i] = c_i;
                    alpha[j] = sum - c_i;
                }
            } else if alpha[j] < 0.0 {
                alpha[j] = 0.0;
                alpha[i] = sum;
            }
            if sum > c_j {
                if alpha[j] > c_j {
                    alpha[j] = c_j;
                    alpha[i] = sum - c_j;
                }
            } else if alpha[i] < 0.0 {
                alpha[i] = 0.0;
                alpha[j] = sum;
            }
        }

        let delta_alpha_i = self.alpha[i] - old_alpha_i;
        let delta_alpha_j = self.alpha[j] - old_alpha_j;
        for k in 0..active_size {
            self.g[k] += f64::from(q_i[k]) * delta_alpha_i + f64::from(q_j[k]) * delta_alpha_j;
        }

        // Keep G_bar in sync with bound changes
        let ui = self.is_upper_bound(i);
        let uj = self.is_upper_bound(j);
        self.update_alpha_status(i);
        self.update_alpha_status(j);
        let l = self.l;
        if ui != self.is_upper_bound(i) {
            self.load_column(i, l, &mut q_i);
            let sign = if ui { -1.0 } else { 1.0 };
            for k in 0..l {
                self.g_bar[k] += sign * c_i * f64::from(q_i[k]);
            }
        }
        if uj != self.is_upper_bound(j) {
            self.load_column(j, l, &mut q_j);
            let sign = if uj { -1.0 } else { 1.0 };
            for k in 0..l {
                self.g_bar[k] += sign * c_j * f64::from(q_j[k]);
            }
        }

        self.column_i = q_i;
        self.column_j = q_j;
    }

    /// Pick the next working pair, or `None` when the tolerance is met
    fn select_working_set(&mut self) -> Option<(usize, usize)> {
        match self.variant {
            SolverVariant::Standard => self.select_working_set_standard(),
            SolverVariant::Nu => self.select_working_set_nu(),
        }
    }

    fn select_working_set_standard(&mut self) -> Option<(usize, usize)> {
        let active_size = self.active_size;
        let mut gmax = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmax_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for t in 0..active_size {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmax {
                    gmax = -self.g[t];
                    gmax_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmax {
                gmax = self.g[t];
                gmax_idx = Some(t);
            }
        }

        let mut q_i = std::mem::take(&mut self.column_i);
        q_i.clear();
        if let Some(i) = gmax_idx {
            self.load_column(i, active_size, &mut q_i);
        }

        {
            let qd = self.q.get_qd();
            for j in 0..active_size {
                let grad_diff;
                let quad_sign;
                if self.y[j] == 1 {
                    if self.is_lower_bound(j) {
                        continue;
                    }
                    grad_diff = gmax + self.g[j];
                    if self.g[j] >= gmax2 {
                        gmax2 = self.g[j];
                    }
                    quad_sign = -1.0;
                } else {
                    if self.is_upper_bound(j) {
                        continue;
                    }
                    grad_diff = gmax - self.g[j];
                    if -self.g[j] >= gmax2 {
                        gmax2 = -self.g[j];
                    }
                    quad_sign = 1.0;
                }

                // grad_diff > 0 implies a first index was found
                if grad_diff > 0.0 {
                    if let Some(i) = gmax_idx {
                        let quad_coef = qd[i]
                            + qd[j]
                            + quad_sign * 2.0 * f64::from(self.y[i]) * f64::from(q_i[j]);
                        let obj_diff = if quad_coef > 0.0 {
                            -(grad_diff * grad_diff) / quad_coef
                        } else {
                            -(grad_diff * grad_diff) / TAU
                        };
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            }
        }
        self.column_i = q_i;

        if gmax + gmax2 < self.eps {
            return None;
        }
        match (gmax_idx, gmin_idx) {
            (Some(i), Some(j)) => Some((i, j)),
            _ => None,
        }
    }

    fn select_working_set_nu(&mut self) -> Option<(usize, usize)> {
        let active_size = self.active_size;
        let mut gmaxp = f64::NEG_INFINITY;
        let mut gmaxp2 = f64::NEG_INFINITY;
        let mut gmaxp_idx = None;
        let mut gmaxn = f64::NEG_INFINITY;
        let mut gmaxn2 = f64::NEG_INFINITY;
        let mut gmaxn_idx = None;
        let mut gmin_idx = None;
        let mut obj_diff_min = f64::INFINITY;

        for t in 0..active_size {
            if self.y[t] == 1 {
                if !self.is_upper_bound(t) && -self.g[t] >= gmaxp {
                    gmaxp = -self.g[t];
                    gmaxp_idx = Some(t);
                }
            } else if !self.is_lower_bound(t) && self.g[t] >= gmaxn {
                gmaxn = self.g[t];
                gmaxn_idx = Some(t);
            }
        }

        let mut q_ip = std::mem::take(&mut self.column_i);
        let mut q_in = std::mem::take(&mut self.column_j);
        q_ip.clear();
        q_in.clear();
        if let Some(ip) = gmaxp_idx {
            self.load_column(ip, active_size, &mut q_ip);
        }
        if let Some(in_) = gmaxn_idx {
            self.load_column(in_, active_size, &mut q_in);
        }

        {
            let qd = self.q.get_qd();
            for j in 0..active_size {
                let (grad_diff, first, column) = if self.y[j] == 1 {
                    if self.is_lower_bound(j) {
                        continue;
                    }
                    let grad_diff = gmaxp + self.g[j];
                    if self.g[j] >= gmaxp2 {
                        gmaxp2 = self.g[j];
                    }
                    (grad_diff, gmaxp_idx, &q_ip)
                } else {
                    if self.is_upper_bound(j) {
                        continue;
                    }
                    let grad_diff = gmaxn - self.g[j];
                    if -self.g[j] >= gmaxn2 {
                        gmaxn2 = -self.g[j];
                    }
                    (grad_diff, gmaxn_idx, &q_in)
                };

                if grad_diff > 0.0 {
                    if let Some(i) = first {
                        let quad_coef = qd[i] + qd[j] - 2.0 * f64::from(column[j]);
                        let obj_diff = if quad_coef > 0.0 {
                            -(grad_diff * grad_diff) / quad_coef
                        } else {
                            -(grad_diff * grad_diff) / TAU
                        };
                        if obj_diff <= obj_diff_min {
                            gmin_idx = Some(j);
                            obj_diff_min = obj_diff;
                        }
                    }
                }
            }
        }
        self.column_i = q_ip;
        self.column_j = q_in;

        if (gmaxp + gmaxp2).max(gmaxn + gmaxn2) < self.eps {
            return None;
        }
        let j = gmin_idx?;
        let i = if self.y[j] == 1 { gmaxp_idx } else { gmaxn_idx }?;
        Some((i, j))
    }

    /// Compute rho, plus r for the nu variant
    fn calculate_rho(&self) -> (f64, f64) {
        match self.variant {
            SolverVariant::Standard => (self.calculate_rho_standard(), 0.0),
            SolverVariant::Nu => self.calculate_rho_nu(),
        }
    }

    fn calculate_rho_standard(&self) -> f64 {
        let mut nr_free = 0usize;
        let mut ub = f64::INFINITY;
        let mut lb = f64::NEG_INFINITY;
        let mut sum_free = 0.0;

        for i in 0..self.active_size {
            let y_g = f64::from(self.y[i]) * self.g[i];
            if self.is_upper_bound(i) {
                if self.y[i] == -1 {
                    ub = ub.min(y_g);
                } else {
                    lb = lb.max(y_g);
                }
            } else if self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    ub = ub.min(y_g);
                } else {
                    lb = lb.max(y_g);
                }
            } else {
                nr_free += 1;
                sum_free += y_g;
            }
        }

        if nr_free > 0 {
            sum_free / nr_free as f64
        } else {
            (ub + lb) / 2.0
        }
    }

    fn calculate_rho_nu(&self) -> (f64, f64) {
        let mut nr_free1 = 0usize;
        let mut nr_free2 = 0usize;
        let mut ub1 = f64::INFINITY;
        let mut ub2 = f64::INFINITY;
        let mut lb1 = f64::NEG_INFINITY;
        let mut lb2 = f64::NEG_INFINITY;
        let mut sum_free1 = 0.0;
        let mut sum_free2 = 0.0;

        for i in 0..self.active_size {
            let g = self.g[i];
            if self.y[i] == 1 {
                if self.is_upper_bound(i) {
                    lb1 = lb1.max(g);
                } else if self.is_lower_bound(i) {
                    ub1 = ub1.min(g);
                } else {
                    nr_free1 += 1;
                    sum_free1 += g;
                }
            } else if self.is_upper_bound(i) {
                lb2 = lb2.max(g);
            } else if self.is_lower_bound(i) {
                ub2 = ub2.min(g);
            } else {
                nr_free2 += 1;
                sum_free2 += g;
            }
        }

        let r1 = if nr_free1 > 0 {
            sum_free1 / nr_free1 as f64
        } else {
            (ub1 + lb1) / 2.0
        };
        let r2 = if nr_free2 > 0 {
            sum_free2 / nr_free2 as f64
        } else {
            (ub2 + lb2) / 2.0
        };

        ((r1 - r2) / 2.0, (r1 + r2) / 2.0)
    }

    pub(super) fn load_column(&mut self, i: usize, len: usize, buffer: &mut Vec<Qfloat>) {
        buffer.clear();
        buffer.extend_from_slice(&self.q.get_q(i, len)[..len]);
    }

    pub(super) fn swap_index(&mut self, i: usize, j: usize) {
        self.q.swap_index(i, j);
        self.y.swap(i, j);
        self.g.swap(i, j);
        self.alpha_status.swap(i, j);
        self.alpha.swap(i, j);
        self.p.swap(i, j);
        self.active_set.swap(i, j);
        self.g_bar.swap(i, j);
    }

    pub(super) fn get_c(&self, i: usize) -> f64 {
        if self.y[i] > 0 {
            self.cp
        } else {
            self.cn
        }
    }

    fn update_alpha_status(&mut self, i: usize) {
        self.alpha_status[i] = if self.alpha[i] >= self.get_c(i) {
            AlphaStatus::UpperBound
        } else if self.alpha[i] <= 0.0 {
            AlphaStatus::LowerBound
        } else {
            AlphaStatus::Free
        };
    }

    pub(super) fn is_upper_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::UpperBound
    }

    pub(super) fn is_lower_bound(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::LowerBound
    }

    pub(super) fn is_free(&self, i: usize) -> bool {
        self.alpha_status[i] == AlphaStatus::Free
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::kernel::Kernel;
    use crate::solver::qmatrix::SvcQ;
    use approx::assert_relative_eq;

    fn points(values: &[f64]) -> Vec<SparseVector> {
        values
            .iter()
            .map(|&v| SparseVector::from_dense(&[v]))
            .collect()
    }

    #[test]
    fn test_two_points_linear() {
        // x = +1 (y = +1), x = -1 (y = -1): w = 1, b = 0, alpha = 0.5 each
        let data = points(&[1.0, -1.0]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1i8, -1];
        let q = SvcQ::new(&x, &y, Kernel::Linear, 1.0);
        let mut alpha = vec![0.0; 2];

        let si = Solver::solve(
            SolverVariant::Standard,
            Box::new(q),
            &[-1.0, -1.0],
            &y,
            &mut alpha,
            10.0,
            10.0,
            &SolverConfig::default(),
        )
        .unwrap();

        assert_relative_eq!(alpha[0], 0.5, epsilon = 1e-9);
        assert_relative_eq!(alpha[1], 0.5, epsilon = 1e-9);
        assert_relative_eq!(si.rho, 0.0, epsilon = 1e-9);
        assert_relative_eq!(si.obj, -0.5, epsilon = 1e-9);
        assert_eq!(si.upper_bound_p, 10.0);
    }

    #[test]
    fn test_box_constraint_is_respected() {
        // Overlapping classes push multipliers to the bound C
        let data = points(&[1.0, 0.5, -1.0, 0.6, -0.4, -0.7]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1i8, 1, 1, -1, -1, -1];
        let q = SvcQ::new(&x, &y, Kernel::Rbf { gamma: 1.0 }, 1.0);
        let mut alpha = vec![0.0; 6];
        let c = 0.5;

        Solver::solve(
            SolverVariant::Standard,
            Box::new(q),
            &[-1.0; 6],
            &y,
            &mut alpha,
            c,
            c,
            &SolverConfig::default(),
        )
        .unwrap();

        let balance: f64 = alpha
            .iter()
            .zip(&y)
            .map(|(a, &yi)| a * f64::from(yi))
            .sum();
        assert_relative_eq!(balance, 0.0, epsilon = 1e-9);
        assert!(alpha.iter().all(|&a| (0.0..=c).contains(&a)));
        assert!(alpha.iter().any(|&a| a == c));
    }

    #[test]
    fn test_iteration_cap_reports_convergence_error() {
        let data = points(&[1.0, 0.5, -1.0, 0.6, -0.4, -0.7]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1i8, 1, 1, -1, -1, -1];
        let q = SvcQ::new(&x, &y, Kernel::Rbf { gamma: 1.0 }, 1.0);
        let mut alpha = vec![0.0; 6];
        let config = SolverConfig {
            max_iterations: Some(1),
            ..SolverConfig::default()
        };

        let result = Solver::solve(
            SolverVariant::Standard,
            Box::new(q),
            &[-1.0; 6],
            &y,
            &mut alpha,
            1.0,
            1.0,
            &config,
        );
        assert!(matches!(result, Err(SVMError::ConvergenceError(_))));
    }
}
