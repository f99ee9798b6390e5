// Recommendation engine: weighted-sum course scoring with optional classifier blending.
// The scorer is built once at startup and shared read-only across handlers.

pub mod classifier;
pub mod courses;
pub mod features;
pub mod model_store;
pub mod scorer;
