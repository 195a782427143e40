//! Shrinking heuristic
//!
//! Variables that sit at a bound and are unlikely to move are temporarily
//! removed from the active set. Once the problem is nearly solved
//! (violation below ten times the tolerance) the full gradient is rebuilt
//! and shrinking restarts from the whole set.

use crate::solver::smo::{Solver, SolverVariant};
use log::debug;

impl Solver<'_> {
    pub(super) fn do_shrinking(&mut self) {
        match self.variant {
            SolverVariant::Standard => self.do_shrinking_standard(),
            SolverVariant::Nu => self.do_shrinking_nu(),
        }
    }

    fn do_shrinking_standard(&mut self) {
        // max { -y_i grad(f)_i | i in I_up }, max { y_i grad(f)_i | i in I_low }
        let mut gmax1 = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;

        for i in 0..self.active_size {
            let g = self.g[i];
            if self.y[i] == 1 {
                if !self.is_upper_bound(i) && -g >= gmax1 {
                    gmax1 = -g;
                }
                if !self.is_lower_bound(i) && g >= gmax2 {
                    gmax2 = g;
                }
            } else {
                if !self.is_upper_bound(i) && -g >= gmax2 {
                    gmax2 = -g;
                }
                if !self.is_lower_bound(i) && g >= gmax1 {
                    gmax1 = g;
                }
            }
        }

        if !self.unshrink && gmax1 + gmax2 <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.l;
            debug!("unshrinking");
        }

        self.shrink_active_set(|s, i| s.be_shrunk_standard(i, gmax1, gmax2));
    }

    fn do_shrinking_nu(&mut self) {
        // gmax1/gmax2 cover y = +1 (I_up / I_low), gmax3/gmax4 cover y = -1
        let mut gmax1 = f64::NEG_INFINITY;
        let mut gmax2 = f64::NEG_INFINITY;
        let mut gmax3 = f64::NEG_INFINITY;
        let mut gmax4 = f64::NEG_INFINITY;

        for i in 0..self.active_size {
            let g = self.g[i];
            if !self.is_upper_bound(i) {
                if self.y[i] == 1 {
                    if -g > gmax1 {
                        gmax1 = -g;
                    }
                } else if -g > gmax4 {
                    gmax4 = -g;
                }
            }
            if !self.is_lower_bound(i) {
                if self.y[i] == 1 {
                    if g > gmax2 {
                        gmax2 = g;
                    }
                } else if g > gmax3 {
                    gmax3 = g;
                }
            }
        }

        if !self.unshrink && (gmax1 + gmax2).max(gmax3 + gmax4) <= self.eps * 10.0 {
            self.unshrink = true;
            self.reconstruct_gradient();
            self.active_size = self.l;
            debug!("unshrinking");
        }

        self.shrink_active_set(|s, i| s.be_shrunk_nu(i, gmax1, gmax2, gmax3, gmax4));
    }

    /// Move every shrinkable variable behind `active_size`
    fn shrink_active_set<F>(&mut self, be_shrunk: F)
    where
        F: Fn(&Self, usize) -> bool,
    {
        let mut i = 0;
        while i < self.active_size {
            if be_shrunk(&*self, i) {
                self.active_size -= 1;
                while self.active_size > i {
                    if !be_shrunk(&*self, self.active_size) {
                        self.swap_index(i, self.active_size);
                        break;
                    }
                    self.active_size -= 1;
                }
            }
            i += 1;
        }
    }

    fn be_shrunk_standard(&self, i: usize, gmax1: f64, gmax2: f64) -> bool {
        let g = self.g[i];
        if self.is_upper_bound(i) {
            if self.y[i] == 1 {
                -g > gmax1
            } else {
                -g > gmax2
            }
        } else if self.is_lower_bound(i) {
            if self.y[i] == 1 {
                g > gmax2
            } else {
                g > gmax1
            }
        } else {
            false
        }
    }

    fn be_shrunk_nu(&self, i: usize, gmax1: f64, gmax2: f64, gmax3: f64, gmax4: f64) -> bool {
        let g = self.g[i];
        if self.is_upper_bound(i) {
            if self.y[i] == 1 {
                -g > gmax1
            } else {
                -g > gmax4
            }
        } else if self.is_lower_bound(i) {
            if self.y[i] == 1 {
                g > gmax2
            } else {
                g > gmax3
            }
        } else {
            false
        }
    }

    /// Rebuild the gradient of inactive variables from G_bar and the free set
    pub(super) fn reconstruct_gradient(&mut self) {
        let active_size = self.active_size;
        let l = self.l;
        if active_size == l {
            return;
        }

        for j in active_size..l {
            self.g[j] = self.g_bar[j] + self.p[j];
        }

        let nr_free = (0..active_size).filter(|&j| self.is_free(j)).count();
        if 2 * nr_free < active_size {
            debug!("few free variables; disabling shrinking may be faster");
        }

        let mut column = Vec::with_capacity(l);
        if nr_free * l > 2 * active_size * (l - active_size) {
            for i in active_size..l {
                self.load_column(i, active_size, &mut column);
                for j in 0..active_size {
                    if self.is_free(j) {
                        self.g[i] += self.alpha[j] * f64::from(column[j]);
                    }
                }
            }
        } else {
            for i in 0..active_size {
                if self.is_free(i) {
                    self.load_column(i, l, &mut column);
                    let alpha_i = self.alpha[i];
                    for j in active_size..l {
                        self.g[j] += alpha_i * f64::from(column[j]);
                    }
                }
            }
        }
    }
}
