//! Evaluation metrics for predictions against known targets

use std::fmt;

/// Summary of predictions against expected values
#[derive(Debug, Clone, PartialEq)]
pub enum EvaluationMetrics {
    /// Label agreement for classifiers (and one-class models)
    Classification { correct: usize, total: usize },
    /// Error statistics for regression
    Regression {
        total: usize,
        mean_squared_error: f64,
        squared_correlation: f64,
    },
}

impl EvaluationMetrics {
    /// Count exact label matches
    pub fn classification(predicted: &[f64], expected: &[f64]) -> Self {
        let correct = predicted
            .iter()
            .zip(expected)
            .filter(|(p, e)| p == e)
            .count();
        EvaluationMetrics::Classification {
            correct,
            total: predicted.len().min(expected.len()),
        }
    }

    /// Mean squared error and squared correlation coefficient
    pub fn regression(predicted: &[f64], expected: &[f64]) -> Self {
        let mut error = 0.0;
        let (mut sum_v, mut sum_y, mut sum_vv, mut sum_yy, mut sum_vy) = (0.0, 0.0, 0.0, 0.0, 0.0);
        let mut total = 0;

        for (&v, &y) in predicted.iter().zip(expected) {
            error += (v - y) * (v - y);
            sum_v += v;
            sum_y += y;
            sum_vv += v * v;
            sum_yy += y * y;
            sum_vy += v * y;
            total += 1;
        }

        let l = total as f64;
        let mean_squared_error = if total == 0 { 0.0 } else { error / l };
        let squared_correlation = ((l * sum_vy - sum_v * sum_y) * (l * sum_vy - sum_v * sum_y))
            / ((l * sum_vv - sum_v * sum_v) * (l * sum_yy - sum_y * sum_y));

        EvaluationMetrics::Regression {
            total,
            mean_squared_error,
            squared_correlation,
        }
    }

    /// Number of evaluated samples
    pub fn total(&self) -> usize {
        match *self {
            EvaluationMetrics::Classification { total, .. } => total,
            EvaluationMetrics::Regression { total, .. } => total,
        }
    }

    /// Fraction of correct labels, for classification
    pub fn accuracy(&self) -> Option<f64> {
        match *self {
            EvaluationMetrics::Classification { correct, total } => {
                if total == 0 {
                    Some(0.0)
                } else {
                    Some(correct as f64 / total as f64)
                }
            }
            EvaluationMetrics::Regression { .. } => None,
        }
    }

    pub fn mean_squared_error(&self) -> Option<f64> {
        match *self {
            EvaluationMetrics::Regression {
                mean_squared_error, ..
            } => Some(mean_squared_error),
            EvaluationMetrics::Classification { .. } => None,
        }
    }

    pub fn squared_correlation(&self) -> Option<f64> {
        match *self {
            EvaluationMetrics::Regression {
                squared_correlation,
                ..
            } => Some(squared_correlation),
            EvaluationMetrics::Classification { .. } => None,
        }
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            EvaluationMetrics::Classification { correct, total } => {
                let accuracy = self.accuracy().unwrap_or(0.0);
                write!(
                    f,
                    "Accuracy = {}% ({}/{}) (classification)",
                    accuracy * 100.0,
                    correct,
                    total
                )
            }
            EvaluationMetrics::Regression {
                mean_squared_error,
                squared_correlation,
                ..
            } => {
                writeln!(f, "Mean squared error = {} (regression)", mean_squared_error)?;
                write!(
                    f,
                    "Squared correlation coefficient = {} (regression)",
                    squared_correlation
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_classification_accuracy() {
        let metrics = EvaluationMetrics::classification(&[1.0, 2.0, 2.0, 3.0], &[1.0, 2.0, 3.0, 3.0]);

        assert_eq!(metrics.total(), 4);
        assert_eq!(metrics.accuracy(), Some(0.75));
        assert_eq!(metrics.mean_squared_error(), None);
        assert_eq!(
            metrics.to_string(),
            "Accuracy = 75% (3/4) (classification)"
        );
    }

    #[test]
    fn test_empty_classification() {
        let metrics = EvaluationMetrics::classification(&[], &[]);
        assert_eq!(metrics.accuracy(), Some(0.0));
    }

    #[test]
    fn test_regression_metrics() {
        let predicted = [1.0, 2.0, 3.0, 4.0];
        let expected = [1.5, 2.0, 2.5, 4.0];
        let metrics = EvaluationMetrics::regression(&predicted, &expected);

        assert_eq!(metrics.accuracy(), None);
        assert_relative_eq!(metrics.mean_squared_error().unwrap(), 0.125);
        assert!(metrics.squared_correlation().unwrap() > 0.9);
        assert!(metrics.squared_correlation().unwrap() <= 1.0);
    }

    #[test]
    fn test_perfect_regression() {
        let values = [0.5, -1.0, 2.0];
        let metrics = EvaluationMetrics::regression(&values, &values);
        assert_eq!(metrics.mean_squared_error(), Some(0.0));
        assert_relative_eq!(metrics.squared_correlation().unwrap(), 1.0, epsilon = 1e-12);
    }
}
