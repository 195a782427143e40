//! Model assembly from solved sub-problems
//!
//! Classification trains one binary problem per class pair on the
//! concatenation of both class blocks. A training vector becomes a support
//! vector if any of its pairwise coefficients is non-zero; its coefficient
//! for the pair `(i, j)` goes to slot `j - 1` if it belongs to class `i` and
//! to slot `i` if it belongs to class `j`.

use super::probability::{binary_svc_probability, svr_probability};
use crate::core::{Result, SparseVector, TrainerConfig};
use crate::model::{Model, ModelParts, SupportVector};
use crate::solver::{train_one, DecisionFunction};
use log::{info, warn};
use rand::rngs::StdRng;

/// Training vectors grouped by class, in class order
pub(super) struct GroupedProblem<'a> {
    pub labels: Vec<i32>,
    pub groups: Vec<Vec<&'a SparseVector>>,
}

/// C of each class after applying the configured weights
fn weighted_c(labels: &[i32], config: &TrainerConfig) -> Vec<f64> {
    let mut weighted = vec![config.c; labels.len()];
    for &(label, weight) in &config.class_weights {
        match labels.iter().position(|&l| l == label) {
            Some(j) => weighted[j] *= weight,
            None => warn!("class label {} specified in weight is not found", label),
        }
    }
    weighted
}

pub(super) fn train_classifier(
    problem: &GroupedProblem<'_>,
    config: &TrainerConfig,
    input_size: usize,
    rng: &mut StdRng,
) -> Result<Model> {
    let k = problem.labels.len();
    let counts: Vec<usize> = problem.groups.iter().map(Vec::len).collect();
    let mut starts = vec![0; k];
    for i in 1..k {
        starts[i] = starts[i - 1] + counts[i - 1];
    }
    let x: Vec<&SparseVector> = problem.groups.iter().flatten().copied().collect();
    let weighted = weighted_c(&problem.labels, config);

    let mut nonzero = vec![false; x.len()];
    let mut functions: Vec<DecisionFunction> = Vec::with_capacity(k * (k - 1) / 2);
    let mut prob_a = Vec::new();
    let mut prob_b = Vec::new();

    for i in 0..k {
        for j in (i + 1)..k {
            let (si, ci) = (starts[i], counts[i]);
            let (sj, cj) = (starts[j], counts[j]);

            let sub_x: Vec<&SparseVector> = x[si..si + ci]
                .iter()
                .chain(&x[sj..sj + cj])
                .copied()
                .collect();
            let sub_y: Vec<f64> = std::iter::repeat(1.0)
                .take(ci)
                .chain(std::iter::repeat(-1.0).take(cj))
                .collect();

            if config.probability {
                let (a, b) =
                    binary_svc_probability(&sub_x, &sub_y, config, weighted[i], weighted[j], rng)?;
                prob_a.push(a);
                prob_b.push(b);
            }

            let function = train_one(&sub_x, &sub_y, config, weighted[i], weighted[j])?;
            for (offset, &a) in function.alpha[..ci].iter().enumerate() {
                if a != 0.0 {
                    nonzero[si + offset] = true;
                }
            }
            for (offset, &a) in function.alpha[ci..].iter().enumerate() {
                if a != 0.0 {
                    nonzero[sj + offset] = true;
                }
            }
            functions.push(function);
        }
    }

    // Position of each training vector in the support vector list
    let mut sv_position = vec![None; x.len()];
    let mut total = 0;
    for (g, &nz) in nonzero.iter().enumerate() {
        if nz {
            sv_position[g] = Some(total);
            total += 1;
        }
    }
    let sv_counts: Vec<usize> = (0..k)
        .map(|c| nonzero[starts[c]..starts[c] + counts[c]].iter().filter(|&&nz| nz).count())
        .collect();

    let mut coefficients = vec![vec![0.0; k - 1]; total];
    let mut p = 0;
    for i in 0..k {
        for j in (i + 1)..k {
            let function = &functions[p];
            let ci = counts[i];
            for offset in 0..ci {
                if let Some(pos) = sv_position[starts[i] + offset] {
                    coefficients[pos][j - 1] = function.alpha[offset];
                }
            }
            for offset in 0..counts[j] {
                if let Some(pos) = sv_position[starts[j] + offset] {
                    coefficients[pos][i] = function.alpha[ci + offset];
                }
            }
            p += 1;
        }
    }

    info!("Total nSV = {}", total);

    let support_vectors = nonzero
        .iter()
        .enumerate()
        .filter(|&(_, &nz)| nz)
        .map(|(g, _)| x[g].clone())
        .zip(coefficients)
        .map(|(features, coefs)| SupportVector::new(features, coefs))
        .collect();

    let (prob_a, prob_b) = if config.probability {
        (Some(prob_a), Some(prob_b))
    } else {
        (None, None)
    };

    Model::new(ModelParts {
        svm_type: config.svm_type,
        kernel: config.kernel,
        input_size,
        classes: problem.labels.clone(),
        sv_counts,
        support_vectors,
        rho: functions.iter().map(|f| f.rho).collect(),
        prob_a,
        prob_b,
        input_subtract: config.input_subtract.clone(),
        input_divide: config.input_divide.clone(),
    })
}

/// One-class and regression models: a single decision function
pub(super) fn train_single(
    x: &[&SparseVector],
    y: &[f64],
    config: &TrainerConfig,
    input_size: usize,
    rng: &mut StdRng,
) -> Result<Model> {
    let prob_a = if config.probability && config.svm_type.is_regression() {
        Some(vec![svr_probability(x, y, config, rng)?])
    } else {
        None
    };

    let function = train_one(x, y, config, 0.0, 0.0)?;
    let support_vectors: Vec<SupportVector> = x
        .iter()
        .zip(&function.alpha)
        .filter(|&(_, &a)| a != 0.0)
        .map(|(xi, &a)| SupportVector::new((*xi).clone(), vec![a]))
        .collect();

    info!("Total nSV = {}", support_vectors.len());

    Model::new(ModelParts {
        svm_type: config.svm_type,
        kernel: config.kernel,
        input_size,
        classes: Vec::new(),
        sv_counts: Vec::new(),
        support_vectors,
        rho: vec![function.rho],
        prob_a,
        prob_b: None,
        input_subtract: config.input_subtract.clone(),
        input_divide: config.input_divide.clone(),
    })
}
