//! Dual formulations of the five SVM types
//!
//! Each function sets up the linear term, labels and starting point for its
//! problem, runs [`Solver`] on the matching Q matrix and maps the solution
//! back to one signed coefficient per training vector.

use crate::core::{Result, SparseVector, SvmType, TrainerConfig};
use crate::solver::qmatrix::{OneClassQ, SvcQ, SvrQ};
use crate::solver::smo::{SolutionInfo, Solver, SolverConfig, SolverVariant};
use log::{debug, info};

/// Coefficients and bias of one binary decision function
#[derive(Debug, Clone)]
pub struct DecisionFunction {
    pub alpha: Vec<f64>,
    pub rho: f64,
}

fn solver_config(config: &TrainerConfig) -> SolverConfig {
    SolverConfig {
        eps: config.tolerance,
        shrinking: config.shrinking,
        max_iterations: config.max_iterations,
    }
}

fn signs(y: &[f64]) -> Vec<i8> {
    y.iter().map(|&v| if v > 0.0 { 1 } else { -1 }).collect()
}

/// Train one binary (or one-class / regression) decision function
///
/// `y` holds +1/-1 labels for classification and targets for regression.
/// `config.kernel` must already carry a resolved gamma.
pub fn train_one(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    cp: f64,
    cn: f64,
) -> Result<DecisionFunction> {
    let l = x.len();
    let mut alpha = vec![0.0; l];

    let si = match config.svm_type {
        SvmType::CSvc => solve_c_svc(x, y, config, &mut alpha, cp, cn)?,
        SvmType::NuSvc => solve_nu_svc(x, y, config, &mut alpha)?,
        SvmType::OneClass => solve_one_class(x, config, &mut alpha)?,
        SvmType::EpsilonSvr => solve_epsilon_svr(x, y, config, &mut alpha)?,
        SvmType::NuSvr => solve_nu_svr(x, y, config, &mut alpha)?,
    };

    info!("obj = {}, rho = {}", si.obj, si.rho);

    let mut n_sv = 0;
    let mut n_bsv = 0;
    for (a, &target) in alpha.iter().zip(y) {
        if a.abs() > 0.0 {
            n_sv += 1;
            let bound = if target > 0.0 {
                si.upper_bound_p
            } else {
                si.upper_bound_n
            };
            if a.abs() >= bound {
                n_bsv += 1;
            }
        }
    }
    info!("nSV = {}, nBSV = {}", n_sv, n_bsv);

    Ok(DecisionFunction { alpha, rho: si.rho })
}

fn solve_c_svc(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    alpha: &mut [f64],
    cp: f64,
    cn: f64,
) -> Result<SolutionInfo> {
    let l = x.len();
    let y = signs(y);
    let minus_ones = vec![-1.0; l];
    alpha.iter_mut().for_each(|a| *a = 0.0);

    let q = SvcQ::new(x, &y, config.kernel, config.cache_size);
    let si = Solver::solve(
        SolverVariant::Standard,
        Box::new(q),
        &minus_ones,
        &y,
        alpha,
        cp,
        cn,
        &solver_config(config),
    )?;

    if cp == cn && l > 0 {
        let sum_alpha: f64 = alpha.iter().sum();
        debug!("nu = {}", sum_alpha / (cp * l as f64));
    }

    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(yi);
    }
    Ok(si)
}

fn solve_nu_svc(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    alpha: &mut [f64],
) -> Result<SolutionInfo> {
    let l = x.len();
    let y = signs(y);
    let nu = config.nu;

    let mut sum_pos = nu * l as f64 / 2.0;
    let mut sum_neg = nu * l as f64 / 2.0;
    for (a, &yi) in alpha.iter_mut().zip(&y) {
        if yi == 1 {
            *a = sum_pos.min(1.0);
            sum_pos -= *a;
        } else {
            *a = sum_neg.min(1.0);
            sum_neg -= *a;
        }
    }

    let zeros = vec![0.0; l];
    let q = SvcQ::new(x, &y, config.kernel, config.cache_size);
    let mut si = Solver::solve(
        SolverVariant::Nu,
        Box::new(q),
        &zeros,
        &y,
        alpha,
        1.0,
        1.0,
        &solver_config(config),
    )?;

    let r = si.r;
    debug!("C = {}", 1.0 / r);

    for (a, &yi) in alpha.iter_mut().zip(&y) {
        *a *= f64::from(yi) / r;
    }
    si.rho /= r;
    si.obj /= r * r;
    si.upper_bound_p = 1.0 / r;
    si.upper_bound_n = 1.0 / r;
    Ok(si)
}

fn solve_one_class(
    x: &[&SparseVector],
    config: &TrainerConfig,
    alpha: &mut [f64],
) -> Result<SolutionInfo> {
    let l = x.len();
    let total = config.nu * l as f64;
    let n = total as usize;

    for (i, a) in alpha.iter_mut().enumerate() {
        *a = if i < n {
            1.0
        } else if i == n {
            total - n as f64
        } else {
            0.0
        };
    }

    let zeros = vec![0.0; l];
    let ones = vec![1i8; l];
    let q = OneClassQ::new(x, config.kernel, config.cache_size);
    Solver::solve(
        SolverVariant::Standard,
        Box::new(q),
        &zeros,
        &ones,
        alpha,
        1.0,
        1.0,
        &solver_config(config),
    )
}

fn solve_epsilon_svr(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    alpha: &mut [f64],
) -> Result<SolutionInfo> {
    let l = x.len();
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear_term = vec![0.0; 2 * l];
    let mut signs = vec![0i8; 2 * l];

    for i in 0..l {
        linear_term[i] = config.epsilon_loss - y[i];
        signs[i] = 1;
        linear_term[i + l] = config.epsilon_loss + y[i];
        signs[i + l] = -1;
    }

    let q = SvrQ::new(x, config.kernel, config.cache_size);
    let si = Solver::solve(
        SolverVariant::Standard,
        Box::new(q),
        &linear_term,
        &signs,
        &mut alpha2,
        config.c,
        config.c,
        &solver_config(config),
    )?;

    let mut sum_alpha = 0.0;
    for i in 0..l {
        alpha[i] = alpha2[i] - alpha2[i + l];
        sum_alpha += alpha[i].abs();
    }
    if l > 0 {
        debug!("nu = {}", sum_alpha / (config.c * l as f64));
    }
    Ok(si)
}

fn solve_nu_svr(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    alpha: &mut [f64],
) -> Result<SolutionInfo> {
    let l = x.len();
    let c = config.c;
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear_term = vec![0.0; 2 * l];
    let mut signs = vec![0i8; 2 * l];

    let mut sum = c * config.nu * l as f64 / 2.0;
    for i in 0..l {
        let start = sum.min(c);
        alpha2[i] = start;
        alpha2[i + l] = start;
        sum -= start;

        linear_term[i] = -y[i];
        signs[i] = 1;
        linear_term[i + l] = y[i];
        signs[i + l] = -1;
    }

    let q = SvrQ::new(x, config.kernel, config.cache_size);
    let si = Solver::solve(
        SolverVariant::Nu,
        Box::new(q),
        &linear_term,
        &signs,
        &mut alpha2,
        c,
        c,
        &solver_config(config),
    )?;

    debug!("epsilon = {}", -si.r);

    for i in 0..l {
        alpha[i] = alpha2[i] - alpha2[i + l];
    }
    Ok(si)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::Kernel;
    use approx::assert_relative_eq;

    fn line(values: &[f64]) -> Vec<SparseVector> {
        values
            .iter()
            .map(|&v| SparseVector::from_dense(&[v]))
            .collect()
    }

    fn config(svm_type: SvmType) -> TrainerConfig {
        TrainerConfig {
            svm_type,
            kernel: Kernel::Linear,
            ..TrainerConfig::default()
        }
    }

    #[test]
    fn test_c_svc_signed_coefficients() {
        let data = line(&[2.0, 1.0, -1.0, -2.0]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1.0, 1.0, -1.0, -1.0];

        let f = train_one(&x, &y, &config(SvmType::CSvc), 1.0, 1.0).unwrap();

        // Support vectors are the inner pair; decision is x - rho with rho = 0
        assert_relative_eq!(f.alpha[1], 0.5, epsilon = 1e-6);
        assert_relative_eq!(f.alpha[2], -0.5, epsilon = 1e-6);
        assert_relative_eq!(f.alpha[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(f.rho, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_nu_svc_balances_classes() {
        let data = line(&[2.0, 1.0, 0.5, -0.5, -1.0, -2.0]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1.0, 1.0, 1.0, -1.0, -1.0, -1.0];

        let f = train_one(&x, &y, &config(SvmType::NuSvc), 1.0, 1.0).unwrap();

        let balance: f64 = f.alpha.iter().sum();
        assert_relative_eq!(balance, 0.0, epsilon = 1e-9);
        assert!(f.alpha[..3].iter().all(|&a| a >= 0.0));
        assert!(f.alpha[3..].iter().all(|&a| a <= 0.0));
    }

    #[test]
    fn test_one_class_alpha_sum() {
        let data = line(&[0.1, 0.2, 0.3, 0.4, 5.0]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let mut cfg = config(SvmType::OneClass);
        cfg.kernel = Kernel::Rbf { gamma: 1.0 };

        let f = train_one(&x, &[1.0; 5], &cfg, 1.0, 1.0).unwrap();

        // eᵀα = nu * l is preserved by the solver
        let total: f64 = f.alpha.iter().sum();
        assert_relative_eq!(total, 2.5, epsilon = 1e-9);
        assert!(f.alpha.iter().all(|&a| (0.0..=1.0).contains(&a)));
    }

    #[test]
    fn test_epsilon_svr_fits_line() {
        let data = line(&[0.0, 1.0, 2.0, 3.0]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1.0, 3.0, 5.0, 7.0];
        let mut cfg = config(SvmType::EpsilonSvr);
        cfg.c = 100.0;
        cfg.epsilon_loss = 0.01;
        cfg.tolerance = 1e-6;

        let f = train_one(&x, &y, &cfg, 0.0, 0.0).unwrap();

        // f(x) = Σ alpha_i x_i x - rho should reproduce 2x + 1 within the tube
        let w: f64 = f
            .alpha
            .iter()
            .zip(&data)
            .map(|(a, v)| a * v.get(0))
            .sum();
        for (v, &target) in data.iter().zip(&y) {
            let predicted = w * v.get(0) - f.rho;
            assert!((predicted - target).abs() < 0.02);
        }
    }

    #[test]
    fn test_nu_svr_fits_line() {
        let data = line(&[0.0, 1.0, 2.0, 3.0]);
        let x: Vec<&SparseVector> = data.iter().collect();
        let y = [1.0, 3.0, 5.0, 7.0];
        let mut cfg = config(SvmType::NuSvr);
        cfg.c = 100.0;
        cfg.tolerance = 1e-6;

        let f = train_one(&x, &y, &cfg, 0.0, 0.0).unwrap();

        let w: f64 = f
            .alpha
            .iter()
            .zip(&data)
            .map(|(a, v)| a * v.get(0))
            .sum();
        assert_relative_eq!(w, 2.0, epsilon = 1e-3);
        assert_relative_eq!(-f.rho, 1.0, epsilon = 1e-3);
    }
}
