//! SVM training
//!
//! [`Trainer`] wraps a [`TrainerConfig`] behind a builder and fits
//! [`Model`]s from per-class sample blocks, regression targets or a whole
//! labelled data set. Training calls take `&self` and leave the
//! configuration untouched.
//!
//! # Example
//!
//! ```rust,no_run
//! use svmlearn::{Kernel, Machine, Trainer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let positives = vec![vec![1.0, 0.5], vec![0.8, 0.9]];
//! let negatives = vec![vec![-1.0, -0.5], vec![-0.7, -0.9]];
//!
//! let model = Trainer::new()
//!     .with_kernel(Kernel::Linear)
//!     .with_c(10.0)
//!     .train(&[positives, negatives])?;
//!
//! let machine = Machine::new(model);
//! assert_eq!(machine.predict_class(&[0.9, 0.7])?, 1.0);
//! # Ok(())
//! # }
//! ```

mod probability;
mod train;

use self::train::{train_classifier, train_single, GroupedProblem};
use crate::core::{Dataset, Result, SVMError, SparseVector, SvmType, TrainerConfig};
use crate::kernel::Kernel;
use crate::model::Model;
use log::debug;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn config_error(message: impl Into<String>) -> SVMError {
    SVMError::ConfigurationError(message.into())
}

/// SVM trainer with builder-style configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Trainer {
    config: TrainerConfig,
}

impl Trainer {
    /// Create a trainer with libsvm's default parameters
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a trainer from a complete configuration
    pub fn with_config(config: TrainerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainerConfig {
        &self.config
    }

    pub fn with_svm_type(mut self, svm_type: SvmType) -> Self {
        self.config.svm_type = svm_type;
        self
    }

    /// Set the kernel; a gamma of 0 means `1 / number_of_features`
    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.config.kernel = kernel;
        self
    }

    /// Set regularization parameter C
    pub fn with_c(mut self, c: f64) -> Self {
        self.config.c = c;
        self
    }

    pub fn with_nu(mut self, nu: f64) -> Self {
        self.config.nu = nu;
        self
    }

    /// Set the epsilon-SVR tube width
    pub fn with_epsilon_loss(mut self, epsilon_loss: f64) -> Self {
        self.config.epsilon_loss = epsilon_loss;
        self
    }

    /// Set kernel cache size in megabytes
    pub fn with_cache_size(mut self, megabytes: f64) -> Self {
        self.config.cache_size = megabytes;
        self
    }

    /// Set convergence tolerance
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.config.tolerance = tolerance;
        self
    }

    pub fn with_shrinking(mut self, shrinking: bool) -> Self {
        self.config.shrinking = shrinking;
        self
    }

    /// Fit probability parameters after training
    pub fn with_probability(mut self, probability: bool) -> Self {
        self.config.probability = probability;
        self
    }

    /// Multiply C by `weight` for the class labelled `label`
    pub fn with_class_weight(mut self, label: i32, weight: f64) -> Self {
        match self.config.class_weights.iter_mut().find(|(l, _)| *l == label) {
            Some(entry) => entry.1 = weight,
            None => self.config.class_weights.push((label, weight)),
        }
        self
    }

    /// Set maximum number of solver iterations
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = Some(max_iterations);
        self
    }

    /// Seed of the cross-validation shuffle used for probability fitting
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Normalize inputs as `(x - subtract) / divide` and store both vectors
    pub fn with_normalization(mut self, subtract: Vec<f64>, divide: Vec<f64>) -> Self {
        self.config.input_subtract = Some(subtract);
        self.config.input_divide = Some(divide);
        self
    }

    /// Train a classifier or one-class model from per-class blocks
    ///
    /// Two blocks are labelled `+1` and `-1`; more blocks are labelled
    /// `1..=k` in the order given. One-class models take exactly one block.
    pub fn train(&self, classes: &[Vec<Vec<f64>>]) -> Result<Model> {
        self.check_parameters()?;
        let svm_type = self.config.svm_type;

        if svm_type.is_regression() {
            return Err(config_error(
                "regression machines are trained with train_regression",
            ));
        }
        if svm_type == SvmType::OneClass && classes.len() != 1 {
            return Err(config_error(format!(
                "one-class training takes exactly one block of samples, got {}",
                classes.len()
            )));
        }
        if svm_type.is_classification() && classes.len() < 2 {
            return Err(config_error(format!(
                "classification needs at least two classes, got {}",
                classes.len()
            )));
        }
        if classes.iter().any(Vec::is_empty) {
            return Err(config_error("class blocks must not be empty"));
        }

        let width = classes[0][0].len();
        check_width(classes.iter().flatten(), width)?;
        let config = self.resolved_config(width)?;

        let blocks: Vec<Vec<SparseVector>> = classes
            .iter()
            .map(|block| block.iter().map(|row| self.sparse_row(row)).collect())
            .collect();
        let mut rng = StdRng::seed_from_u64(config.seed);

        if svm_type == SvmType::OneClass {
            let x: Vec<&SparseVector> = blocks[0].iter().collect();
            let y = vec![1.0; x.len()];
            return train_single(&x, &y, &config, width, &mut rng);
        }

        let labels: Vec<i32> = if blocks.len() == 2 {
            vec![1, -1]
        } else {
            (1..=blocks.len() as i32).collect()
        };
        let problem = GroupedProblem {
            labels,
            groups: blocks.iter().map(|block| block.iter().collect()).collect(),
        };
        check_nu_feasibility(&config, &problem)?;
        train_classifier(&problem, &config, width, &mut rng)
    }

    /// Train an epsilon-SVR or nu-SVR model
    pub fn train_regression(&self, inputs: &[Vec<f64>], targets: &[f64]) -> Result<Model> {
        self.check_parameters()?;
        if !self.config.svm_type.is_regression() {
            return Err(config_error(format!(
                "train_regression needs a regression type, got {}",
                self.config.svm_type
            )));
        }
        if inputs.len() != targets.len() {
            return Err(SVMError::DimensionMismatch {
                expected: inputs.len(),
                actual: targets.len(),
            });
        }
        if inputs.is_empty() {
            return Err(config_error("no training samples"));
        }

        let width = inputs[0].len();
        check_width(inputs.iter(), width)?;
        let config = self.resolved_config(width)?;

        let rows: Vec<SparseVector> = inputs.iter().map(|row| self.sparse_row(row)).collect();
        let x: Vec<&SparseVector> = rows.iter().collect();
        let mut rng = StdRng::seed_from_u64(config.seed);
        train_single(&x, targets, &config, width, &mut rng)
    }

    /// Train on a labelled data set, as `svm-train` does
    ///
    /// Classification labels must be integers; classes are ordered by
    /// first appearance.
    pub fn train_samples<D: Dataset + ?Sized>(&self, data: &D) -> Result<Model> {
        self.check_parameters()?;
        if data.is_empty() {
            return Err(config_error("no training samples"));
        }

        let width = data.dim();
        let config = self.resolved_config(width)?;
        let samples = data.get_batch(&(0..data.len()).collect::<Vec<_>>());
        let rows: Vec<SparseVector> = samples
            .iter()
            .map(|s| self.prepare_sparse(&s.features, width))
            .collect();
        let targets: Vec<f64> = samples.iter().map(|s| s.label).collect();
        let mut rng = StdRng::seed_from_u64(config.seed);

        if !config.svm_type.is_classification() {
            let x: Vec<&SparseVector> = rows.iter().collect();
            return train_single(&x, &targets, &config, width, &mut rng);
        }

        let mut labels: Vec<i32> = Vec::new();
        let mut groups: Vec<Vec<&SparseVector>> = Vec::new();
        for (row, &target) in rows.iter().zip(&targets) {
            if target.fract() != 0.0 {
                return Err(config_error(format!(
                    "class labels must be integers, got {}",
                    target
                )));
            }
            let label = target as i32;
            match labels.iter().position(|&l| l == label) {
                Some(c) => groups[c].push(row),
                None => {
                    labels.push(label);
                    groups.push(vec![row]);
                }
            }
        }
        if labels.len() < 2 {
            return Err(config_error(format!(
                "classification needs at least two classes, got {}",
                labels.len()
            )));
        }

        let problem = GroupedProblem { labels, groups };
        check_nu_feasibility(&config, &problem)?;
        train_classifier(&problem, &config, width, &mut rng)
    }

    /// Parameter checks that do not depend on the data
    fn check_parameters(&self) -> Result<()> {
        let config = &self.config;
        let svm_type = config.svm_type;

        if config.kernel.gamma().is_some_and(|g| !(g >= 0.0)) {
            return Err(config_error("gamma < 0"));
        }
        if config.kernel.degree().is_some_and(|d| d < 0) {
            return Err(config_error("degree of polynomial kernel < 0"));
        }
        if !(config.cache_size > 0.0) {
            return Err(config_error("cache_size <= 0"));
        }
        if !(config.tolerance > 0.0) {
            return Err(config_error("eps <= 0"));
        }
        if matches!(
            svm_type,
            SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr
        ) && !(config.c > 0.0)
        {
            return Err(config_error("C <= 0"));
        }
        if matches!(svm_type, SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr)
            && !(config.nu > 0.0 && config.nu <= 1.0)
        {
            return Err(config_error("nu <= 0 or nu > 1"));
        }
        if svm_type == SvmType::EpsilonSvr && !(config.epsilon_loss >= 0.0) {
            return Err(config_error("p < 0"));
        }
        if config.probability && svm_type == SvmType::OneClass {
            return Err(config_error(
                "one-class SVM probability output not supported",
            ));
        }
        if config.max_iterations == Some(0) {
            return Err(config_error("max_iterations must be positive"));
        }
        Ok(())
    }

    /// Configuration for a data width: normalization checked, gamma resolved
    fn resolved_config(&self, width: usize) -> Result<TrainerConfig> {
        if width == 0 {
            return Err(config_error("training data has no features"));
        }

        let mut config = self.config.clone();
        if let Some(subtract) = &config.input_subtract {
            if subtract.len() != width {
                return Err(config_error(format!(
                    "input_subtract has {} entries, data has {} features",
                    subtract.len(),
                    width
                )));
            }
        }
        if let Some(divide) = &config.input_divide {
            if divide.len() != width {
                return Err(config_error(format!(
                    "input_divide has {} entries, data has {} features",
                    divide.len(),
                    width
                )));
            }
            if divide.iter().any(|&d| d == 0.0) {
                return Err(config_error("input_divide contains zero"));
            }
        }

        if config.kernel.gamma() == Some(0.0) {
            let gamma = 1.0 / width as f64;
            debug!("gamma set to 1/{} = {}", width, gamma);
            config.kernel = config.kernel.with_gamma(gamma);
        }
        Ok(config)
    }

    /// Normalize one dense row into the solver's sparse form
    fn sparse_row(&self, row: &[f64]) -> SparseVector {
        match (&self.config.input_subtract, &self.config.input_divide) {
            (None, None) => SparseVector::from_dense(row),
            (subtract, divide) => {
                let normalized: Vec<f64> = row
                    .iter()
                    .enumerate()
                    .map(|(i, &v)| {
                        let sub = subtract.as_ref().map_or(0.0, |s| s[i]);
                        let div = divide.as_ref().map_or(1.0, |d| d[i]);
                        (v - sub) / div
                    })
                    .collect();
                SparseVector::from_dense(&normalized)
            }
        }
    }

    fn prepare_sparse(&self, features: &SparseVector, width: usize) -> SparseVector {
        if self.config.input_subtract.is_none() && self.config.input_divide.is_none() {
            features.clone()
        } else {
            self.sparse_row(&features.to_dense(width))
        }
    }
}

/// Every row must have `width` features
fn check_width<'a, I>(rows: I, width: usize) -> Result<()>
where
    I: Iterator<Item = &'a Vec<f64>>,
{
    for row in rows {
        if row.len() != width {
            return Err(SVMError::DimensionMismatch {
                expected: width,
                actual: row.len(),
            });
        }
    }
    Ok(())
}

/// nu-SVC needs `nu * (n_i + n_j) / 2 <= min(n_i, n_j)` for every pair
fn check_nu_feasibility(config: &TrainerConfig, problem: &GroupedProblem<'_>) -> Result<()> {
    if config.svm_type != SvmType::NuSvc {
        return Ok(());
    }
    let counts: Vec<usize> = problem.groups.iter().map(Vec::len).collect();
    for (i, &n1) in counts.iter().enumerate() {
        for &n2 in &counts[i + 1..] {
            if config.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                return Err(config_error("specified nu is infeasible"));
            }
        }
    }
    Ok(())
}
