//! Cross-validated fitting of probability parameters

use crate::core::{Result, SparseVector, TrainerConfig};
use crate::kernel::Kernel;
use crate::probability::sigmoid_train;
use crate::solver::{train_one, DecisionFunction};
use log::{info, warn};
use rand::rngs::StdRng;
use rand::Rng;

const NR_FOLD: usize = 5;

/// Random permutation of `0..l`
fn shuffled_indices(l: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut perm: Vec<usize> = (0..l).collect();
    for i in 0..l {
        let j = rng.gen_range(i..l);
        perm.swap(i, j);
    }
    perm
}

/// Held-out range `begin..end` of `fold` within the shuffled order
fn fold_bounds(fold: usize, nr_fold: usize, l: usize) -> (usize, usize) {
    (fold * l / nr_fold, (fold + 1) * l / nr_fold)
}

/// Stable partition of `train` with the positive examples first
///
/// Fold sub-problems are laid out the same way as the full pairwise
/// problems, which keeps the solver's visiting order and its results aligned.
fn positives_first(train: Vec<usize>, y: &[f64]) -> Vec<usize> {
    let (mut positives, negatives): (Vec<usize>, Vec<usize>) =
        train.into_iter().partition(|&i| y[i] > 0.0);
    positives.extend(negatives);
    positives
}

fn decision_value(
    kernel: &Kernel,
    x: &[&SparseVector],
    function: &DecisionFunction,
    point: &SparseVector,
) -> f64 {
    let sum: f64 = x
        .iter()
        .zip(&function.alpha)
        .filter(|&(_, &a)| a != 0.0)
        .map(|(xi, &a)| a * kernel.evaluate(xi, point))
        .sum();
    sum - function.rho
}

/// Fit Platt's sigmoid for one binary sub-problem
///
/// Decision values come from 5-fold cross-validation so that the sigmoid
/// is not fitted on training outputs. `y` holds +1/-1 labels.
pub(super) fn binary_svc_probability(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    cp: f64,
    cn: f64,
    rng: &mut StdRng,
) -> Result<(f64, f64)> {
    let l = x.len();
    let perm = shuffled_indices(l, rng);
    let mut dec_values = vec![0.0; l];

    for fold in 0..NR_FOLD {
        let (begin, end) = fold_bounds(fold, NR_FOLD, l);
        let train = positives_first(
            perm[..begin].iter().chain(&perm[end..]).copied().collect(),
            y,
        );
        let sub_x: Vec<&SparseVector> = train.iter().map(|&i| x[i]).collect();
        let sub_y: Vec<f64> = train.iter().map(|&i| y[i]).collect();

        let p_count = sub_y.iter().filter(|&&v| v > 0.0).count();
        let n_count = sub_y.len() - p_count;

        if p_count == 0 && n_count == 0 {
            for &i in &perm[begin..end] {
                dec_values[i] = 0.0;
            }
        } else if n_count == 0 {
            for &i in &perm[begin..end] {
                dec_values[i] = 1.0;
            }
        } else if p_count == 0 {
            for &i in &perm[begin..end] {
                dec_values[i] = -1.0;
            }
        } else {
            let function = train_one(&sub_x, &sub_y, config, cp, cn)?;
            for &i in &perm[begin..end] {
                dec_values[i] = decision_value(&config.kernel, &sub_x, &function, x[i]);
            }
        }
    }

    Ok(sigmoid_train(&dec_values, y))
}

/// Scale of the Laplace noise model for regression
///
/// Residuals come from 5-fold cross-validation; residuals beyond five
/// standard deviations are left out of the estimate.
pub(super) fn svr_probability(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    rng: &mut StdRng,
) -> Result<f64> {
    let l = x.len();
    let nr_fold = if NR_FOLD > l {
        warn!(
            "# folds > # data. Will use # folds = # data instead (i.e., leave-one-out cross validation)"
        );
        l
    } else {
        NR_FOLD
    };

    let perm = shuffled_indices(l, rng);
    let mut residuals = vec![0.0; l];

    for fold in 0..nr_fold {
        let (begin, end) = fold_bounds(fold, nr_fold, l);
        let train: Vec<usize> = perm[..begin].iter().chain(&perm[end..]).copied().collect();
        let sub_x: Vec<&SparseVector> = train.iter().map(|&i| x[i]).collect();
        let sub_y: Vec<f64> = train.iter().map(|&i| y[i]).collect();

        if sub_x.is_empty() {
            for &i in &perm[begin..end] {
                residuals[i] = y[i];
            }
            continue;
        }

        let function = train_one(&sub_x, &sub_y, config, 0.0, 0.0)?;
        for &i in &perm[begin..end] {
            residuals[i] = y[i] - decision_value(&config.kernel, &sub_x, &function, x[i]);
        }
    }

    let mae = residuals.iter().map(|r| r.abs()).sum::<f64>() / l as f64;
    let std = (2.0 * mae * mae).sqrt();

    let kept: Vec<f64> = residuals
        .iter()
        .map(|r| r.abs())
        .filter(|&r| r <= 5.0 * std)
        .collect();
    let sigma = if kept.is_empty() {
        mae
    } else {
        kept.iter().sum::<f64>() / kept.len() as f64
    };

    info!(
        "Prob. model for test data: target value = predicted value + z, \
         z: Laplace distribution e^(-|z|/sigma)/(2sigma), sigma = {}",
        sigma
    );
    Ok(sigma)
}
