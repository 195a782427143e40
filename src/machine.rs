//! SVM inference engine
//!
//! A [`Machine`] wraps one trained [`Model`] and answers prediction
//! queries on dense feature vectors. Inputs are normalized with the
//! model's `input_subtract`/`input_divide` vectors before the kernel is
//! evaluated.

use crate::core::{Prediction, ProbabilityPrediction, Result, SVMError, SvmType};
use crate::data::SampleSet;
use crate::kernel::Kernel;
use crate::metrics::EvaluationMetrics;
use crate::model::Model;
use crate::persistence::{self, ModelFormat};
use crate::probability::{argmax_first, multiclass_probability, pairwise_probabilities};
use std::path::Path;

/// SVM machine for prediction
#[derive(Debug, Clone, PartialEq)]
pub struct Machine {
    model: Model,
}

impl Machine {
    /// Wrap a trained model
    pub fn new(model: Model) -> Self {
        Self { model }
    }

    /// Load a machine from a model file (text or container format)
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        persistence::load(path).map(Self::new)
    }

    /// Save the machine; a `.json` extension selects the container format
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        persistence::save(&self.model, path)
    }

    /// Save the machine in an explicit format
    pub fn save_as<P: AsRef<Path>>(&self, path: P, format: ModelFormat) -> Result<()> {
        persistence::save_as(&self.model, path, format)
    }

    /// Underlying model
    pub fn model(&self) -> &Model {
        &self.model
    }

    pub fn into_model(self) -> Model {
        self.model
    }

    /// `(input_size, output_size)`, the latter being the number of decision values
    pub fn shape(&self) -> (usize, usize) {
        (self.model.input_size(), self.model.output_size())
    }

    pub fn svm_type(&self) -> SvmType {
        self.model.svm_type()
    }

    pub fn kernel(&self) -> &Kernel {
        self.model.kernel()
    }

    /// Class labels in model order (empty unless classification)
    pub fn classes(&self) -> &[i32] {
        self.model.classes()
    }

    pub fn gamma(&self) -> Option<f64> {
        self.model.kernel().gamma()
    }

    pub fn degree(&self) -> Option<i32> {
        self.model.kernel().degree()
    }

    pub fn coef0(&self) -> Option<f64> {
        self.model.kernel().coef0()
    }

    /// True when probability estimates are available
    pub fn supports_probability(&self) -> bool {
        self.model.supports_probability()
    }

    pub fn input_subtract(&self) -> &[f64] {
        self.model.input_subtract()
    }

    pub fn input_divide(&self) -> &[f64] {
        self.model.input_divide()
    }

    /// Replace the per-feature offset; must have `input_size` entries
    pub fn set_input_subtract(&mut self, values: Vec<f64>) -> Result<()> {
        self.model.set_input_subtract(values)
    }

    /// Replace the per-feature divisor; must have `input_size` entries
    pub fn set_input_divide(&mut self, values: Vec<f64>) -> Result<()> {
        self.model.set_input_divide(values)
    }

    /// Decision values for one input
    fn decision_values(&self, x: &[f64]) -> Result<Vec<f64>> {
        let prepared = self.model.prepare_input(x)?;
        Ok(self.model.decision_values(&prepared))
    }

    /// Label implied by the decision values
    ///
    /// Classification uses one-against-one voting; ties go to the class
    /// that comes first in model order.
    fn label_from_decisions(&self, decision_values: &[f64]) -> f64 {
        match self.model.svm_type() {
            SvmType::CSvc | SvmType::NuSvc => {
                let classes = self.model.classes();
                let k = classes.len();
                let mut votes = vec![0usize; k];
                let mut p = 0;
                for i in 0..k {
                    for j in (i + 1)..k {
                        if decision_values[p] > 0.0 {
                            votes[i] += 1;
                        } else {
                            votes[j] += 1;
                        }
                        p += 1;
                    }
                }
                let mut winner = 0;
                for (i, &v) in votes.iter().enumerate().skip(1) {
                    if v > votes[winner] {
                        winner = i;
                    }
                }
                f64::from(classes[winner])
            }
            SvmType::OneClass => {
                if decision_values[0] > 0.0 {
                    1.0
                } else {
                    -1.0
                }
            }
            SvmType::EpsilonSvr | SvmType::NuSvr => decision_values[0],
        }
    }

    /// Predict the class (or regression value) of one input
    ///
    /// Fails with `DimensionMismatch` when `x` is shorter than the input
    /// size; longer inputs are truncated.
    pub fn predict_class(&self, x: &[f64]) -> Result<f64> {
        let decisions = self.decision_values(x)?;
        Ok(self.label_from_decisions(&decisions))
    }

    /// Predict every row; fails as a whole if any row fails
    pub fn predict_classes<R: AsRef<[f64]>>(&self, xs: &[R]) -> Result<Vec<f64>> {
        xs.iter().map(|x| self.predict_class(x.as_ref())).collect()
    }

    /// Predict one input, also returning all decision values
    pub fn predict_class_and_scores(&self, x: &[f64]) -> Result<Prediction> {
        let decisions = self.decision_values(x)?;
        let label = self.label_from_decisions(&decisions);
        Ok(Prediction::new(label, decisions))
    }

    pub fn predict_classes_and_scores<R: AsRef<[f64]>>(&self, xs: &[R]) -> Result<Vec<Prediction>> {
        xs.iter()
            .map(|x| self.predict_class_and_scores(x.as_ref()))
            .collect()
    }

    /// Predict one input with per-class probability estimates
    ///
    /// The label is the most probable class, which may differ from the
    /// voting result of [`predict_class`](Self::predict_class).
    pub fn predict_class_and_probabilities(&self, x: &[f64]) -> Result<ProbabilityPrediction> {
        let (prob_a, prob_b) = match (self.model.prob_a(), self.model.prob_b()) {
            (Some(a), Some(b)) if self.model.svm_type().is_classification() => (a, b),
            _ => {
                return Err(SVMError::UnsupportedOperation(
                    "model does not support probability estimates".to_string(),
                ))
            }
        };

        let decisions = self.decision_values(x)?;
        let classes = self.model.classes();
        let r = pairwise_probabilities(classes.len(), &decisions, prob_a, prob_b);
        let probabilities = multiclass_probability(&r);
        let label = f64::from(classes[argmax_first(&probabilities)]);

        Ok(ProbabilityPrediction {
            label,
            probabilities,
        })
    }

    pub fn predict_classes_and_probabilities<R: AsRef<[f64]>>(
        &self,
        xs: &[R],
    ) -> Result<Vec<ProbabilityPrediction>> {
        xs.iter()
            .map(|x| self.predict_class_and_probabilities(x.as_ref()))
            .collect()
    }

    /// Evaluate on a labelled sample set
    ///
    /// Reports accuracy for classification and one-class models, mean
    /// squared error and squared correlation for regression.
    pub fn evaluate(&self, samples: &SampleSet) -> Result<EvaluationMetrics> {
        let width = self.model.input_size();
        let mut predicted = Vec::with_capacity(samples.len());
        for sample in samples.samples() {
            predicted.push(self.predict_class(&sample.features.to_dense(width))?);
        }

        let expected = samples.labels();
        if self.model.svm_type().is_regression() {
            Ok(EvaluationMetrics::regression(&predicted, &expected))
        } else {
            Ok(EvaluationMetrics::classification(&predicted, &expected))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::SparseVector;
    use crate::model::tests::three_class_model;
    use crate::model::{ModelParts, SupportVector};
    use approx::assert_relative_eq;

    fn binary_model(prob: bool) -> Model {
        Model::new(ModelParts {
            svm_type: SvmType::CSvc,
            kernel: Kernel::Linear,
            input_size: 2,
            classes: vec![1, -1],
            sv_counts: vec![1, 1],
            support_vectors: vec![
                SupportVector::new(SparseVector::new(vec![0], vec![1.0]), vec![0.5]),
                SupportVector::new(SparseVector::new(vec![0], vec![-1.0]), vec![-0.5]),
            ],
            rho: vec![0.0],
            prob_a: prob.then(|| vec![-3.0]),
            prob_b: prob.then(|| vec![0.0]),
            input_subtract: None,
            input_divide: None,
        })
        .unwrap()
    }

    #[test]
    fn test_shape_and_accessors() {
        let machine = Machine::new(binary_model(true));
        assert_eq!(machine.shape(), (2, 1));
        assert_eq!(machine.classes(), &[1, -1]);
        assert_eq!(machine.gamma(), None);
        assert!(machine.supports_probability());
        assert_eq!(machine.input_subtract(), &[0.0, 0.0]);
        assert_eq!(machine.input_divide(), &[1.0, 1.0]);

        let machine = Machine::new(three_class_model());
        assert_eq!(machine.shape(), (2, 3));
    }

    #[test]
    fn test_binary_prediction() {
        let machine = Machine::new(binary_model(false));

        // Decision value = x0 - 0
        assert_eq!(machine.predict_class(&[0.7, 5.0]).unwrap(), 1.0);
        assert_eq!(machine.predict_class(&[-0.7, 5.0]).unwrap(), -1.0);
        // A zero decision value votes for the second class
        assert_eq!(machine.predict_class(&[0.0, 0.0]).unwrap(), -1.0);

        let pred = machine.predict_class_and_scores(&[0.25, 0.0]).unwrap();
        assert_eq!(pred.label, 1.0);
        assert_relative_eq!(pred.scores[0], 0.25);
    }

    #[test]
    fn test_dimension_checks() {
        let machine = Machine::new(binary_model(false));
        assert!(matches!(
            machine.predict_class(&[1.0]),
            Err(SVMError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
        // Extra trailing features are ignored
        assert_eq!(machine.predict_class(&[1.0, 0.0, 9.0]).unwrap(), 1.0);

        // Batch calls fail as a whole
        let rows = vec![vec![1.0, 0.0], vec![1.0]];
        assert!(machine.predict_classes(&rows).is_err());
    }

    #[test]
    fn test_normalization_is_applied() {
        let mut machine = Machine::new(binary_model(false));
        machine.set_input_subtract(vec![10.0, 0.0]).unwrap();
        machine.set_input_divide(vec![2.0, 1.0]).unwrap();

        // (9 - 10) / 2 < 0
        assert_eq!(machine.predict_class(&[9.0, 0.0]).unwrap(), -1.0);
        assert_eq!(machine.predict_class(&[11.0, 0.0]).unwrap(), 1.0);
        assert!(machine.set_input_subtract(vec![0.0]).is_err());
    }

    #[test]
    fn test_multiclass_votes() {
        let machine = Machine::new(three_class_model());
        // Decision values [2, 4, 2]: class 1 wins both its duels
        assert_eq!(machine.predict_class(&[2.0, 0.0]).unwrap(), 1.0);
        // Near feature 1, class 2 wins
        assert_eq!(machine.predict_class(&[0.0, 2.0]).unwrap(), 2.0);
        // Opposite corner, class 3 wins
        assert_eq!(machine.predict_class(&[-2.0, -2.0]).unwrap(), 3.0);

        let preds = machine
            .predict_classes_and_scores(&[vec![2.0, 0.0], vec![0.0, 2.0]])
            .unwrap();
        assert_eq!(preds.len(), 2);
        assert_eq!(preds[0].scores, vec![2.0, 4.0, 2.0]);
    }

    #[test]
    fn test_zero_decision_values_vote_for_second_class() {
        let machine = Machine::new(three_class_model());
        // All kernel values vanish: every decision value is 0, so each duel
        // goes to its second class (class 2 once, class 3 twice)
        assert_eq!(machine.predict_class(&[0.0, 0.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_probabilities() {
        let machine = Machine::new(binary_model(true));
        let pred = machine.predict_class_and_probabilities(&[1.0, 0.0]).unwrap();

        assert_eq!(pred.probabilities.len(), 2);
        assert_relative_eq!(pred.probabilities.iter().sum::<f64>(), 1.0, epsilon = 1e-9);
        assert!(pred.probabilities[0] > pred.probabilities[1]);
        assert_eq!(pred.label, 1.0);
    }

    #[test]
    fn test_probabilities_unsupported() {
        let machine = Machine::new(binary_model(false));
        assert!(matches!(
            machine.predict_class_and_probabilities(&[1.0, 0.0]),
            Err(SVMError::UnsupportedOperation(_))
        ));
        assert!(machine
            .predict_classes_and_probabilities(&[vec![1.0, 0.0]])
            .is_err());
    }
}
