//! Recommendation scorer: weighted-sum course scores, optionally blended with a
//! trained classifier.
//!
//! Algorithm:
//! 1. For every catalog course, sum the selected options' weights; divide by the
//!    grand total of all weights and scale to 0–100.
//! 2. If a classifier is loaded, boost the predicted course by `boost_factor`
//!    (re-normalized unless `renormalize_boost` is off).
//! 3. Recommend the top course (catalog order breaks ties); confidence is the gap
//!    to the runner-up over 100, clamped to [0.1, 1.0].
//!
//! Any failure yields the uniform fallback result instead of an error.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, warn};

use crate::recommendation::classifier::CourseClassifier;
use crate::recommendation::courses::CourseCatalog;
use crate::recommendation::features::{build_feature_vector, StandardScaler};

pub const DEFAULT_BOOST_FACTOR: f64 = 1.2;
pub const DEFAULT_MODEL_VERSION: &str = "1.0.0";
pub const MIN_CONFIDENCE: f64 = 0.1;
pub const MAX_CONFIDENCE: f64 = 1.0;
pub const SINGLE_COURSE_CONFIDENCE: f64 = 0.8;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Raw option weights keyed by course key (`ti`) or legacy column name (`weight_ti`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WeightVector(pub BTreeMap<String, f64>);

impl<K: Into<String>> FromIterator<(K, f64)> for WeightVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// One answered question, with the weights of the option that was picked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub question_id: i64,
    pub selected_option_id: i64,
    pub response_time_ms: i64,
    pub weights: WeightVector,
}

// ────────────────────────────────────────────────────────────────────────────
// Outputs
// ────────────────────────────────────────────────────────────────────────────

/// Course scores in catalog order. Serializes as a JSON object whose keys keep
/// that order, in both directions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreVector(Vec<(String, f64)>);

impl ScoreVector {
    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| *v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.0.iter().map(|(_, v)| *v)
    }

    pub fn total(&self) -> f64 {
        self.values().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Top entry; the earliest course wins ties.
    fn top(&self) -> Option<(&str, f64)> {
        self.iter().fold(None, |best, (k, v)| match best {
            Some((_, b)) if v <= b => best,
            _ => Some((k, v)),
        })
    }
}

impl<K: Into<String>> FromIterator<(K, f64)> for ScoreVector {
    fn from_iter<I: IntoIterator<Item = (K, f64)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

impl Serialize for ScoreVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ScoreVector {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ScoreVisitor;

        impl<'de> Visitor<'de> for ScoreVisitor {
            type Value = ScoreVector;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of course keys to scores")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<ScoreVector, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((key, score)) = access.next_entry::<String, f64>()? {
                    entries.push((key, score));
                }
                Ok(ScoreVector(entries))
            }
        }

        deserializer.deserialize_map(ScoreVisitor)
    }
}

/// The classifier's vote, when one is loaded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifierPrediction {
    pub course: String,
    pub probability: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub scores: ScoreVector,
    pub recommended_course: String,
    pub recommended_course_name: String,
    pub confidence_score: f64,
    pub processing_time_ms: u64,
    pub model_version: String,
    pub prediction: Option<ClassifierPrediction>,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

/// Internal scoring failures. Never leaves `RecommendationScorer::classify`.
#[derive(Debug, Error)]
pub enum ScoringError {
    #[error("no responses or samples to score")]
    EmptyInput,

    #[error("course catalog is empty")]
    EmptyCatalog,

    #[error("weight key '{0}' is not a catalog course")]
    UnknownWeightKey(String),

    #[error("weight for course '{0}' is missing")]
    MissingWeight(String),

    #[error("weight for course '{0}' given twice")]
    DuplicateWeight(String),

    #[error("weight for course '{key}' is invalid: {value}")]
    InvalidWeight { key: String, value: f64 },

    #[error("total weight is zero")]
    ZeroTotalWeight,

    #[error("feature width mismatch: expected {expected}, got {actual}")]
    FeatureWidth { expected: usize, actual: usize },

    #[error("classifier class {class} outside catalog of {courses} courses")]
    ClassOutOfRange { class: usize, courses: usize },

    #[error("classifier error: {0}")]
    Classifier(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Scorer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub boost_factor: f64,
    /// Re-normalize scores to sum to 100 after boosting. Off reproduces the
    /// legacy stored results, where boosted vectors sum above 100.
    pub renormalize_boost: bool,
    pub model_version: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            boost_factor: DEFAULT_BOOST_FACTOR,
            renormalize_boost: true,
            model_version: DEFAULT_MODEL_VERSION.to_string(),
        }
    }
}

/// Scaler and classifier loaded together; one is useless without the other.
pub struct BlendModel {
    pub scaler: StandardScaler,
    pub classifier: Box<dyn CourseClassifier>,
}

/// Immutable after construction; share it behind an `Arc`.
pub struct RecommendationScorer {
    catalog: CourseCatalog,
    config: ScoringConfig,
    model: Option<BlendModel>,
}

impl RecommendationScorer {
    pub fn new(catalog: CourseCatalog, config: ScoringConfig) -> Result<Self, ScoringError> {
        if catalog.is_empty() {
            return Err(ScoringError::EmptyCatalog);
        }
        Ok(Self {
            catalog,
            config,
            model: None,
        })
    }

    /// Attaches a classifier after checking it agrees with the catalog and scaler.
    pub fn with_model(mut self, model: BlendModel) -> Result<Self, ScoringError> {
        if model.classifier.n_classes() != self.catalog.len() {
            return Err(ScoringError::ClassOutOfRange {
                class: model.classifier.n_classes().saturating_sub(1),
                courses: self.catalog.len(),
            });
        }
        if model.scaler.width() != model.classifier.n_features() {
            return Err(ScoringError::FeatureWidth {
                expected: model.classifier.n_features(),
                actual: model.scaler.width(),
            });
        }
        self.model = Some(model);
        Ok(self)
    }

    pub fn catalog(&self) -> &CourseCatalog {
        &self.catalog
    }

    /// Scores a questionnaire. Never fails: errors degrade to the uniform fallback.
    pub fn classify(&self, responses: &[Response]) -> ClassificationResult {
        let start = Instant::now();
        let mut result = match self.try_classify(responses) {
            Ok(result) => result,
            Err(e) => {
                warn!("Scoring failed, returning fallback recommendation: {e}");
                self.fallback()
            }
        };
        result.processing_time_ms = start.elapsed().as_millis() as u64;
        result
    }

    fn try_classify(&self, responses: &[Response]) -> Result<ClassificationResult, ScoringError> {
        let mut scores = self.weighted_scores(responses)?;

        let prediction = match &self.model {
            Some(model) => {
                let prediction = self.predict(model, responses)?;
                self.apply_boost(&mut scores, &prediction.course);
                Some(prediction)
            }
            None => None,
        };

        let (top_key, _) = scores.top().ok_or(ScoringError::EmptyCatalog)?;
        let recommended_course = top_key.to_string();
        let confidence_score = confidence(&scores);

        debug!(
            "Recommended '{recommended_course}' with confidence {confidence_score:.3} from {} responses",
            responses.len()
        );

        Ok(ClassificationResult {
            recommended_course_name: self.catalog.display_name(&recommended_course).to_string(),
            recommended_course,
            confidence_score,
            scores,
            processing_time_ms: 0,
            model_version: self.config.model_version.clone(),
            prediction,
        })
    }

    /// Weighted-sum step: per-course share of all weight seen, scaled to 0–100.
    pub fn weighted_scores(&self, responses: &[Response]) -> Result<ScoreVector, ScoringError> {
        if responses.is_empty() {
            return Err(ScoringError::EmptyInput);
        }

        let mut sums = vec![0.0_f64; self.catalog.len()];
        let mut total = 0.0_f64;

        for response in responses {
            let row = self.validate_weights(&response.weights)?;
            for (sum, w) in sums.iter_mut().zip(&row) {
                *sum += w;
                total += w;
            }
        }

        if total <= 0.0 {
            return Err(ScoringError::ZeroTotalWeight);
        }

        Ok(ScoreVector(
            self.catalog
                .keys()
                .zip(sums)
                .map(|(k, sum)| (k.to_string(), sum * 100.0 / total))
                .collect(),
        ))
    }

    /// Orders a weight map by catalog, rejecting unknown, duplicate, missing,
    /// negative and non-finite entries.
    fn validate_weights(&self, weights: &WeightVector) -> Result<Vec<f64>, ScoringError> {
        let mut row: Vec<Option<f64>> = vec![None; self.catalog.len()];

        for (raw_key, &value) in &weights.0 {
            let key = self
                .catalog
                .canonical_key(raw_key)
                .ok_or_else(|| ScoringError::UnknownWeightKey(raw_key.clone()))?;
            if !value.is_finite() || value < 0.0 {
                return Err(ScoringError::InvalidWeight {
                    key: key.to_string(),
                    value,
                });
            }
            let idx = self
                .catalog
                .index_of(key)
                .ok_or_else(|| ScoringError::UnknownWeightKey(raw_key.clone()))?;
            if row[idx].replace(value).is_some() {
                return Err(ScoringError::DuplicateWeight(key.to_string()));
            }
        }

        row.into_iter()
            .zip(self.catalog.keys())
            .map(|(w, key)| w.ok_or_else(|| ScoringError::MissingWeight(key.to_string())))
            .collect()
    }

    fn predict(
        &self,
        model: &BlendModel,
        responses: &[Response],
    ) -> Result<ClassifierPrediction, ScoringError> {
        let features = build_feature_vector(responses, model.classifier.n_features());
        let scaled = model.scaler.transform(&features)?;
        let (class, probability) = model.classifier.predict(&scaled)?;
        let course = self
            .catalog
            .get(class)
            .ok_or(ScoringError::ClassOutOfRange {
                class,
                courses: self.catalog.len(),
            })?;
        Ok(ClassifierPrediction {
            course: course.key.clone(),
            probability,
        })
    }

    fn apply_boost(&self, scores: &mut ScoreVector, course: &str) {
        for (k, v) in scores.0.iter_mut() {
            if k.as_str() == course {
                *v *= self.config.boost_factor;
            }
        }
        if self.config.renormalize_boost {
            let total = scores.total();
            if total > 0.0 {
                scores.0.iter_mut().for_each(|(_, v)| *v = *v * 100.0 / total);
            }
        }
    }

    /// Uniform result: every course at 100/n, first course recommended, confidence 0.5.
    pub fn fallback(&self) -> ClassificationResult {
        let share = 100.0 / self.catalog.len() as f64;
        let first = self
            .catalog
            .courses()
            .first()
            .map(|c| (c.key.clone(), c.name.clone()))
            .unwrap_or_default();
        ClassificationResult {
            scores: ScoreVector(self.catalog.keys().map(|k| (k.to_string(), share)).collect()),
            recommended_course: first.0,
            recommended_course_name: first.1,
            confidence_score: FALLBACK_CONFIDENCE,
            processing_time_ms: 0,
            model_version: self.config.model_version.clone(),
            prediction: None,
        }
    }
}

/// Gap between the two best scores over 100, clamped to [0.1, 1.0].
fn confidence(scores: &ScoreVector) -> f64 {
    if scores.len() < 2 {
        return SINGLE_COURSE_CONFIDENCE;
    }
    let mut sorted: Vec<f64> = scores.values().collect();
    sorted.sort_by(|a, b| b.total_cmp(a));
    ((sorted[0] - sorted[1]) / 100.0).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
