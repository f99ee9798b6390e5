// Admin API: question bank CRUD, dashboard figures, result analytics, model info.
// Guarded by a static bearer key; token issuance is out of scope.

pub mod analytics;
pub mod auth;
pub mod handlers;
