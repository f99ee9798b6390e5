//! Course classifiers: the optional ML signal blended into weighted scores.
//!
//! Default backend: `LogisticClassifier`, a multinomial logistic regression
//! trained with `linfa-logistic` and stored as its coefficient matrix. Any
//! backend exposing class probabilities can be plugged in through
//! `CourseClassifier`.

use linfa::prelude::*;
use linfa_logistic::MultiLogisticRegression;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::recommendation::scorer::ScoringError;

pub const DEFAULT_MAX_ITERATIONS: u64 = 100;

/// A probabilistic classifier over catalog indices.
///
/// Implementations must be read-only after construction: the scorer shares one
/// instance across all request handlers.
pub trait CourseClassifier: Send + Sync {
    /// Width of the feature vector the classifier expects.
    fn n_features(&self) -> usize;

    /// Number of classes; class `i` corresponds to catalog course `i`.
    fn n_classes(&self) -> usize;

    /// Probability per class, summing to 1.
    fn predict_proba(&self, features: &Array1<f64>) -> Result<Array1<f64>, ScoringError>;

    /// Most probable class and its probability. Ties resolve to the lowest index.
    fn predict(&self, features: &Array1<f64>) -> Result<(usize, f64), ScoringError> {
        let proba = self.predict_proba(features)?;
        argmax(proba.iter().copied()).ok_or(ScoringError::EmptyInput)
    }

    /// Short label reported by the model info endpoint.
    fn model_type(&self) -> &'static str;
}

/// First index of the maximum value.
pub fn argmax(values: impl IntoIterator<Item = f64>) -> Option<(usize, f64)> {
    values
        .into_iter()
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((i, v)),
        })
}

/// Multinomial logistic regression: `softmax(x · params + intercept)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    /// `n_features × n_classes` coefficients.
    pub params: Array2<f64>,
    pub intercept: Array1<f64>,
}

impl LogisticClassifier {
    /// Trains on labels `0..n_classes`. Every class needs at least one sample so
    /// that coefficient column `i` belongs to class `i`.
    pub fn fit(
        records: Array2<f64>,
        labels: Array1<usize>,
        n_classes: usize,
        max_iterations: u64,
    ) -> Result<Self, ScoringError> {
        if records.nrows() == 0 {
            return Err(ScoringError::EmptyInput);
        }
        if records.nrows() != labels.len() {
            return Err(ScoringError::Classifier(format!(
                "{} samples but {} labels",
                records.nrows(),
                labels.len()
            )));
        }
        if n_classes < 2 {
            return Err(ScoringError::Classifier(
                "logistic regression needs at least two classes".into(),
            ));
        }

        let mut seen = vec![false; n_classes];
        for &label in labels.iter() {
            match seen.get_mut(label) {
                Some(slot) => *slot = true,
                None => {
                    return Err(ScoringError::ClassOutOfRange {
                        class: label,
                        courses: n_classes,
                    })
                }
            }
        }
        if let Some(missing) = seen.iter().position(|s| !s) {
            return Err(ScoringError::Classifier(format!(
                "class {missing} has no training samples"
            )));
        }

        let dataset = Dataset::new(records, labels);
        let fitted = MultiLogisticRegression::default()
            .max_iterations(max_iterations)
            .fit(&dataset)
            .map_err(|e| ScoringError::Classifier(format!("logistic regression fit failed: {e}")))?;

        Ok(Self {
            params: fitted.params().clone(),
            intercept: fitted.intercept().clone(),
        })
    }
}

impl CourseClassifier for LogisticClassifier {
    fn n_features(&self) -> usize {
        self.params.nrows()
    }

    fn n_classes(&self) -> usize {
        self.params.ncols()
    }

    fn predict_proba(&self, features: &Array1<f64>) -> Result<Array1<f64>, ScoringError> {
        if self.n_classes() == 0 || self.intercept.len() != self.n_classes() {
            return Err(ScoringError::Classifier(format!(
                "{} coefficient columns but {} intercepts",
                self.n_classes(),
                self.intercept.len()
            )));
        }
        if features.len() != self.n_features() {
            return Err(ScoringError::FeatureWidth {
                expected: self.n_features(),
                actual: features.len(),
            });
        }

        let logits = features.dot(&self.params) + &self.intercept;
        // Shift by the max logit for a stable softmax.
        let max = logits.fold(f64::NEG_INFINITY, |m, &l| m.max(l));
        let exps = logits.mapv(|l| (l - max).exp());
        let total = exps.sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(ScoringError::Classifier("degenerate probabilities".into()));
        }
        Ok(exps / total)
    }

    fn model_type(&self) -> &'static str {
        "logistic-regression"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn two_class() -> LogisticClassifier {
        LogisticClassifier::fit(
            array![
                [0.0, 0.0],
                [0.2, 0.0],
                [0.0, 0.3],
                [5.0, 5.0],
                [5.2, 5.0],
                [5.0, 5.3]
            ],
            array![0, 0, 0, 1, 1, 1],
            2,
            DEFAULT_MAX_ITERATIONS,
        )
        .unwrap()
    }

    #[test]
    fn test_fit_shapes_follow_classes() {
        let clf = two_class();
        assert_eq!(clf.n_classes(), 2);
        assert_eq!(clf.n_features(), 2);
        assert_eq!(clf.intercept.len(), 2);
    }

    #[test]
    fn test_predict_separates_clusters() {
        let clf = two_class();
        let (class, p) = clf.predict(&array![4.8, 5.1]).unwrap();
        assert_eq!(class, 1);
        assert!(p > 0.5, "probability was {p}");
        let (class, _) = clf.predict(&array![0.1, 0.1]).unwrap();
        assert_eq!(class, 0);
    }

    #[test]
    fn test_probabilities_are_softmax_of_logits() {
        let clf = LogisticClassifier {
            params: array![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            intercept: array![0.0, 0.0, 0.0],
        };
        let proba = clf.predict_proba(&array![2.0_f64.ln(), 0.0]).unwrap();
        // logits ln2, 0, 0 → 2/4, 1/4, 1/4
        assert!((proba[0] - 0.5).abs() < 1e-12);
        assert!((proba[1] - 0.25).abs() < 1e-12);
        assert!((proba.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let clf = two_class();
        assert!(matches!(
            clf.predict(&array![1.0, 2.0, 3.0]),
            Err(ScoringError::FeatureWidth { expected: 2, actual: 3 })
        ));
    }

    #[test]
    fn test_fit_rejects_label_outside_classes() {
        let err = LogisticClassifier::fit(array![[1.0], [2.0]], array![0, 3], 2, 10).unwrap_err();
        assert!(matches!(err, ScoringError::ClassOutOfRange { class: 3, .. }));
    }

    #[test]
    fn test_fit_requires_every_class() {
        let err = LogisticClassifier::fit(array![[1.0], [2.0]], array![0, 0], 2, 10).unwrap_err();
        assert!(matches!(err, ScoringError::Classifier(_)));
    }

    #[test]
    fn test_argmax_prefers_first_on_ties() {
        assert_eq!(argmax([0.4, 0.4, 0.2]), Some((0, 0.4)));
        assert_eq!(argmax(Vec::<f64>::new()), None);
    }
}
