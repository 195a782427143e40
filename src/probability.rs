//! Probability estimates from decision values
//!
//! Platt scaling maps a binary decision value to a probability through a
//! fitted sigmoid `1 / (1 + exp(A f + B))`. Multi-class estimates combine
//! the pairwise probabilities with the coupling method of Wu, Lin and Weng
//! (2004), solved by the same fixed-point iteration libsvm uses.

use log::warn;

/// Pairwise probabilities are kept inside [MIN_PROBABILITY, 1 - MIN_PROBABILITY]
pub const MIN_PROBABILITY: f64 = 1e-7;

/// Evaluate the fitted sigmoid in a numerically stable way
pub fn sigmoid_predict(decision_value: f64, a: f64, b: f64) -> f64 {
    let f_apb = decision_value * a + b;
    if f_apb >= 0.0 {
        (-f_apb).exp() / (1.0 + (-f_apb).exp())
    } else {
        1.0 / (1.0 + f_apb.exp())
    }
}

/// Negative log-likelihood of the sigmoid (A, B) on the targets `t`
fn sigmoid_objective(dec_values: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    let mut fval = 0.0;
    for (&dec, &t) in dec_values.iter().zip(targets) {
        let f_apb = dec * a + b;
        if f_apb >= 0.0 {
            fval += t * f_apb + (1.0 + (-f_apb).exp()).ln();
        } else {
            fval += (t - 1.0) * f_apb + (1.0 + f_apb.exp()).ln();
        }
    }
    fval
}

/// Fit Platt's sigmoid to decision values and +1/-1 labels
///
/// Newton's method with backtracking line search (Lin, Lin and Weng, 2007).
/// Returns `(A, B)`.
pub fn sigmoid_train(dec_values: &[f64], labels: &[f64]) -> (f64, f64) {
    const MAX_ITER: usize = 100;
    const MIN_STEP: f64 = 1e-10;
    const SIGMA: f64 = 1e-12;
    const EPS: f64 = 1e-5;

    let prior1 = labels.iter().filter(|&&y| y > 0.0).count() as f64;
    let prior0 = labels.len() as f64 - prior1;

    let hi_target = (prior1 + 1.0) / (prior1 + 2.0);
    let lo_target = 1.0 / (prior0 + 2.0);
    let targets: Vec<f64> = labels
        .iter()
        .map(|&y| if y > 0.0 { hi_target } else { lo_target })
        .collect();

    let mut a = 0.0;
    let mut b = ((prior0 + 1.0) / (prior1 + 1.0)).ln();
    let mut fval = sigmoid_objective(dec_values, &targets, a, b);

    let mut iter = 0;
    while iter < MAX_ITER {
        // Gradient and Hessian (with a ridge on the diagonal)
        let mut h11 = SIGMA;
        let mut h22 = SIGMA;
        let mut h21 = 0.0;
        let mut g1 = 0.0;
        let mut g2 = 0.0;
        for (&dec, &t) in dec_values.iter().zip(&targets) {
            let f_apb = dec * a + b;
            let (p, q) = if f_apb >= 0.0 {
                (
                    (-f_apb).exp() / (1.0 + (-f_apb).exp()),
                    1.0 / (1.0 + (-f_apb).exp()),
                )
            } else {
                (1.0 / (1.0 + f_apb.exp()), f_apb.exp() / (1.0 + f_apb.exp()))
            };
            let d2 = p * q;
            h11 += dec * dec * d2;
            h22 += d2;
            h21 += dec * d2;
            let d1 = t - p;
            g1 += dec * d1;
            g2 += d1;
        }

        if g1.abs() < EPS && g2.abs() < EPS {
            break;
        }

        let det = h11 * h22 - h21 * h21;
        let d_a = -(h22 * g1 - h21 * g2) / det;
        let d_b = -(-h21 * g1 + h11 * g2) / det;
        let gd = g1 * d_a + g2 * d_b;

        let mut stepsize = 1.0;
        while stepsize >= MIN_STEP {
            let new_a = a + stepsize * d_a;
            let new_b = b + stepsize * d_b;
            let newf = sigmoid_objective(dec_values, &targets, new_a, new_b);
            if newf < fval + 0.0001 * stepsize * gd {
                a = new_a;
                b = new_b;
                fval = newf;
                break;
            }
            stepsize /= 2.0;
        }

        if stepsize < MIN_STEP {
            warn!("line search fails in two-class probability estimates");
            break;
        }
        iter += 1;
    }

    if iter >= MAX_ITER {
        warn!("reaching maximal iterations in two-class probability estimates");
    }
    (a, b)
}

/// Couple pairwise probabilities into per-class probabilities
///
/// `r[i][j]` estimates P(class i | class i or j); the diagonal is ignored.
pub fn multiclass_probability(r: &[Vec<f64>]) -> Vec<f64> {
    let k = r.len();
    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;

    let mut q = vec![vec![0.0; k]; k];
    let mut qp = vec![0.0; k];
    let mut p = vec![1.0 / k as f64; k];

    for t in 0..k {
        q[t][t] = 0.0;
        for j in 0..t {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = q[j][t];
        }
        for j in (t + 1)..k {
            q[t][t] += r[j][t] * r[j][t];
            q[t][j] = -r[j][t] * r[t][j];
        }
    }

    let mut iter = 0;
    while iter < max_iter {
        // Stopping condition: every component of Qp equals pQp
        let mut p_qp = 0.0;
        for t in 0..k {
            qp[t] = 0.0;
            for j in 0..k {
                qp[t] += q[t][j] * p[j];
            }
            p_qp += p[t] * qp[t];
        }

        let max_error = qp
            .iter()
            .map(|&v| (v - p_qp).abs())
            .fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + p_qp) / q[t][t];
            p[t] += diff;
            p_qp = (p_qp + diff * (diff * q[t][t] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[t][j]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
        iter += 1;
    }

    if iter >= max_iter {
        warn!("exceeds max_iter in multiclass probability coupling");
    }
    p
}

/// Pairwise probability matrix from decision values and sigmoid parameters
///
/// Decision values and parameters follow the pairwise order `(i, j)`,
/// `i < j`.
pub fn pairwise_probabilities(
    n_classes: usize,
    decision_values: &[f64],
    prob_a: &[f64],
    prob_b: &[f64],
) -> Vec<Vec<f64>> {
    let mut r = vec![vec![0.0; n_classes]; n_classes];
    let mut k = 0;
    for i in 0..n_classes {
        for j in (i + 1)..n_classes {
            let p = sigmoid_predict(decision_values[k], prob_a[k], prob_b[k])
                .max(MIN_PROBABILITY)
                .min(1.0 - MIN_PROBABILITY);
            r[i][j] = p;
            r[j][i] = 1.0 - p;
            k += 1;
        }
    }
    r
}

/// Index of the first maximal element
pub fn argmax_first(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
