//! Model artifacts: load, bootstrap and persist the classifier used for blending.
//!
//! Artifacts live in a single JSON file under the configured model directory.
//! When it is missing, a model is trained from seeded synthetic data so that a
//! fresh deployment has a (deterministic) classifier on first start.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use linfa::Dataset;
use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::recommendation::classifier::{
    CourseClassifier, LogisticClassifier, DEFAULT_MAX_ITERATIONS,
};
use crate::recommendation::features::StandardScaler;
use crate::recommendation::scorer::{BlendModel, ScoringError, DEFAULT_MODEL_VERSION};

pub const MODEL_FILE: &str = "model.json";
pub const BOOTSTRAP_SEED: u64 = 42;
pub const BOOTSTRAP_SAMPLES: usize = 1000;
pub const BOOTSTRAP_FEATURES: usize = 20;
/// Share of samples held out to measure accuracy.
pub const HOLDOUT_FRACTION: f64 = 0.2;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("model file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("model training failed: {0}")]
    Training(#[from] ScoringError),

    #[error("model is incompatible: {0}")]
    Incompatible(String),
}

/// Everything persisted for a trained model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    pub version: String,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub classifier: LogisticClassifier,
    pub trained_at: DateTime<Utc>,
    /// Holdout accuracy in [0, 1].
    pub accuracy: f64,
    pub total_samples: usize,
}

impl ModelArtifacts {
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn model_type(&self) -> &'static str {
        self.classifier.model_type()
    }

    /// Checks internal consistency and agreement with the course count.
    pub fn validate(&self, n_courses: usize) -> Result<(), ModelError> {
        if self.classifier.n_classes() != n_courses {
            return Err(ModelError::Incompatible(format!(
                "classifier has {} classes, catalog has {n_courses} courses",
                self.classifier.n_classes()
            )));
        }
        if self.scaler.width() != self.classifier.n_features()
            || self.n_features() != self.classifier.n_features()
            || self.classifier.intercept.len() != n_courses
        {
            return Err(ModelError::Incompatible(format!(
                "feature widths disagree: names {}, scaler {}, classifier {}",
                self.n_features(),
                self.scaler.width(),
                self.classifier.n_features()
            )));
        }
        Ok(())
    }

    pub fn into_blend_model(self) -> BlendModel {
        BlendModel {
            scaler: self.scaler,
            classifier: Box::new(self.classifier),
        }
    }
}

/// Summary exposed by the admin model endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ModelInfo {
    pub enabled: bool,
    pub version: String,
    pub model_type: String,
    pub features_count: usize,
    pub trained_at: Option<DateTime<Utc>>,
    pub accuracy: Option<f64>,
    pub total_samples: Option<usize>,
}

impl ModelInfo {
    pub fn disabled(version: &str) -> Self {
        Self {
            enabled: false,
            version: version.to_string(),
            model_type: "weighted-sum".to_string(),
            features_count: 0,
            trained_at: None,
            accuracy: None,
            total_samples: None,
        }
    }
}

impl From<&ModelArtifacts> for ModelInfo {
    fn from(a: &ModelArtifacts) -> Self {
        Self {
            enabled: true,
            version: a.version.clone(),
            model_type: format!("weighted-sum + {}", a.model_type()),
            features_count: a.n_features(),
            trained_at: Some(a.trained_at),
            accuracy: Some(a.accuracy),
            total_samples: Some(a.total_samples),
        }
    }
}

/// Reads and writes artifacts in one directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    dir: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE)
    }

    /// Returns `Ok(None)` when no artifact has been saved yet.
    pub fn load(&self) -> Result<Option<ModelArtifacts>, ModelError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&path)?;
        let artifacts: ModelArtifacts = serde_json::from_str(&raw)?;
        info!(
            "Loaded model v{} ({} features) from {}",
            artifacts.version,
            artifacts.n_features(),
            path.display()
        );
        Ok(Some(artifacts))
    }

    pub fn save(&self, artifacts: &ModelArtifacts) -> Result<(), ModelError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path();
        std::fs::write(&path, serde_json::to_vec_pretty(artifacts)?)?;
        info!("Saved model v{} to {}", artifacts.version, path.display());
        Ok(())
    }

    /// Loads the stored model, or trains and saves a bootstrap model when the file
    /// is missing, unreadable or incompatible with `n_courses`.
    pub fn load_or_bootstrap(&self, n_courses: usize) -> Result<ModelArtifacts, ModelError> {
        match self.load() {
            Ok(Some(artifacts)) => match artifacts.validate(n_courses) {
                Ok(()) => return Ok(artifacts),
                Err(e) => warn!("Stored model rejected, bootstrapping a new one: {e}"),
            },
            Ok(None) => info!("No model at {}, bootstrapping", self.path().display()),
            Err(e) => warn!("Failed to load model, bootstrapping a new one: {e}"),
        }

        let artifacts = bootstrap_model(n_courses)?;
        if let Err(e) = self.save(&artifacts) {
            // A read-only model dir still leaves a usable in-memory model.
            warn!("Could not persist bootstrap model: {e}");
        }
        Ok(artifacts)
    }
}

/// Trains on standard-normal synthetic features with uniform random labels.
pub fn bootstrap_model(n_courses: usize) -> Result<ModelArtifacts, ModelError> {
    let mut rng = ChaCha8Rng::seed_from_u64(BOOTSTRAP_SEED);
    let records = Array2::from_shape_fn((BOOTSTRAP_SAMPLES, BOOTSTRAP_FEATURES), |_| {
        rng.sample::<f64, _>(StandardNormal)
    });
    let labels = Array1::from_shape_fn(BOOTSTRAP_SAMPLES, |_| {
        rng.gen_range(0..n_courses.max(1))
    });

    train_model(&records, &labels, n_courses, &mut rng)
}

/// Fits scaler and classifier on a seeded train split and scores the holdout.
pub fn train_model<R: Rng>(
    records: &Array2<f64>,
    labels: &Array1<usize>,
    n_courses: usize,
    rng: &mut R,
) -> Result<ModelArtifacts, ModelError> {
    let n = records.nrows();
    if n != labels.len() {
        return Err(ModelError::Incompatible(format!(
            "{n} samples but {} labels",
            labels.len()
        )));
    }
    if n < 2 {
        return Err(ModelError::Training(ScoringError::EmptyInput));
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(rng);
    let holdout = ((n as f64) * HOLDOUT_FRACTION).round() as usize;
    let holdout = holdout.clamp(1, n - 1);
    let (test_idx, train_idx) = order.split_at(holdout);

    let train_x = records.select(Axis(0), train_idx);
    let train_y = labels.select(Axis(0), train_idx);
    let scaler = StandardScaler::fit(&Dataset::new(train_x.clone(), train_y.clone().insert_axis(Axis(1))))?;
    let classifier = LogisticClassifier::fit(
        scaler.transform_records(&train_x)?,
        train_y,
        n_courses,
        DEFAULT_MAX_ITERATIONS,
    )?;

    let test_x = scaler.transform_records(&records.select(Axis(0), test_idx))?;
    let mut correct = 0usize;
    for (row, &i) in test_x.rows().into_iter().zip(test_idx) {
        let (predicted, _) = classifier.predict(&row.to_owned())?;
        if predicted == labels[i] {
            correct += 1;
        }
    }
    let accuracy = correct as f64 / test_idx.len() as f64;
    info!(
        "Trained {} on {n} samples, holdout accuracy {accuracy:.3}",
        classifier.model_type()
    );

    let width = scaler.width();
    Ok(ModelArtifacts {
        version: DEFAULT_MODEL_VERSION.to_string(),
        feature_names: (0..width).map(|i| format!("feature_{i}")).collect(),
        scaler,
        classifier,
        trained_at: Utc::now(),
        accuracy,
        total_samples: n,
    })
}
