//! Feature extraction and standardization for the course classifier.
//!
//! Each response contributes `[question_id, selected_option_id, response_time_ms]`;
//! the flattened sequence is zero-padded or truncated to the classifier's width.

use linfa::prelude::*;
use linfa_preprocessing::linear_scaling::LinearScaler;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::recommendation::scorer::{Response, ScoringError};

/// Flattens responses into a fixed-width feature vector of length `width`.
pub fn build_feature_vector(responses: &[Response], width: usize) -> Array1<f64> {
    let mut features: Vec<f64> = responses
        .iter()
        .flat_map(|r| {
            [
                r.question_id as f64,
                r.selected_option_id as f64,
                r.response_time_ms as f64,
            ]
        })
        .take(width)
        .collect();
    features.resize(width, 0.0);
    Array1::from_vec(features)
}

/// Standardization fitted by linfa's `LinearScaler::standard`, kept as plain
/// arrays so it can be persisted: `x' = (x - offset) * scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    pub offsets: Array1<f64>,
    pub scales: Array1<f64>,
}

impl StandardScaler {
    /// Fits per-column means and inverse standard deviations on the training set.
    pub fn fit(dataset: &Dataset<f64, usize>) -> Result<Self, ScoringError> {
        let fitted = LinearScaler::<f64>::standard()
            .fit(dataset)
            .map_err(|e| ScoringError::Classifier(format!("scaler fit failed: {e}")))?;
        Ok(Self {
            offsets: fitted.offsets().clone(),
            scales: fitted.scales().clone(),
        })
    }

    /// Pass-through scaler of the given width.
    pub fn identity(width: usize) -> Self {
        Self {
            offsets: Array1::zeros(width),
            scales: Array1::ones(width),
        }
    }

    pub fn width(&self) -> usize {
        self.offsets.len()
    }

    pub fn transform(&self, features: &Array1<f64>) -> Result<Array1<f64>, ScoringError> {
        self.check_width(features.len())?;
        Ok((features - &self.offsets) * &self.scales)
    }

    /// Row-wise `transform` over a sample matrix.
    pub fn transform_records(&self, records: &Array2<f64>) -> Result<Array2<f64>, ScoringError> {
        self.check_width(records.ncols())?;
        Ok((records - &self.offsets) * &self.scales)
    }

    fn check_width(&self, actual: usize) -> Result<(), ScoringError> {
        if actual != self.width() || self.scales.len() != self.width() {
            return Err(ScoringError::FeatureWidth {
                expected: self.width(),
                actual,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recommendation::scorer::WeightVector;
    use ndarray::{array, Axis};

    fn response(question_id: i64, option_id: i64, latency: i64) -> Response {
        Response {
            question_id,
            selected_option_id: option_id,
            response_time_ms: latency,
            weights: WeightVector::default(),
        }
    }

    #[test]
    fn test_feature_vector_pads_with_zero() {
        let features = build_feature_vector(&[response(1, 3, 1500)], 6);
        assert_eq!(features, array![1.0, 3.0, 1500.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_feature_vector_truncates_from_end() {
        let responses = vec![response(1, 2, 100), response(2, 7, 200)];
        let features = build_feature_vector(&responses, 4);
        assert_eq!(features, array![1.0, 2.0, 100.0, 2.0]);
    }

    #[test]
    fn test_scaler_fit_centres_columns() {
        let dataset = Dataset::new(array![[1.0, 10.0], [3.0, 10.0]], array![0usize, 1].insert_axis(Axis(1)));
        let scaler = StandardScaler::fit(&dataset).unwrap();
        assert_eq!(scaler.offsets, array![2.0, 10.0]);

        // The column means map to the origin; a constant column is only centred.
        let centred = scaler.transform(&array![2.0, 10.0]).unwrap();
        assert!(centred.iter().all(|v| v.abs() < 1e-12));
        let scaled = scaler.transform(&array![3.0, 12.0]).unwrap();
        assert!(scaled[0] > 0.0);
        assert!((scaled[1] - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_transform_records_matches_row_transform() {
        let scaler = StandardScaler {
            offsets: array![1.0, 2.0],
            scales: array![0.5, 2.0],
        };
        let records = scaler
            .transform_records(&array![[3.0, 2.0], [1.0, 3.0]])
            .unwrap();
        assert_eq!(records, array![[1.0, 0.0], [0.0, 2.0]]);
        assert_eq!(
            scaler.transform(&array![1.0, 3.0]).unwrap(),
            records.row(1).to_owned()
        );
    }

    #[test]
    fn test_scaler_rejects_width_mismatch() {
        let scaler = StandardScaler::identity(3);
        let err = scaler.transform(&array![1.0, 2.0]).unwrap_err();
        assert!(matches!(
            err,
            ScoringError::FeatureWidth {
                expected: 3,
                actual: 2
            }
        ));
    }
}
