// Questionnaire: question bank, submission scoring and result lookup.

pub mod handlers;
pub mod repository;
pub mod seed;
pub mod validation;
