use crate::errors::AppError;
use crate::models::question::{NewOption, NewQuestion, QuestionUpdate};
use crate::models::result::SubmittedResponse;
use crate::recommendation::courses::CourseCatalog;
use crate::recommendation::scorer::WeightVector;

/// Rewrites option weights onto bare catalog keys, filling absent courses with 0.0.
/// Unknown keys, duplicates after prefix stripping, and negative or non-finite
/// values are rejected.
pub fn normalize_weights(
    catalog: &CourseCatalog,
    weights: WeightVector,
) -> Result<WeightVector, AppError> {
    let mut out = WeightVector::default();
    for (raw_key, value) in weights.0 {
        let key = catalog
            .canonical_key(&raw_key)
            .ok_or_else(|| AppError::Validation(format!("Unknown course weight '{raw_key}'")))?;
        if !value.is_finite() || value < 0.0 {
            return Err(AppError::Validation(format!(
                "Weight for '{key}' must be a non-negative number"
            )));
        }
        if out.0.insert(key.to_string(), value).is_some() {
            return Err(AppError::Validation(format!(
                "Weight for '{key}' given more than once"
            )));
        }
    }
    for key in catalog.keys() {
        out.0.entry(key.to_string()).or_insert(0.0);
    }
    Ok(out)
}

fn normalize_options(
    catalog: &CourseCatalog,
    options: Vec<NewOption>,
) -> Result<Vec<NewOption>, AppError> {
    if options.is_empty() {
        return Err(AppError::Validation(
            "A question needs at least one option".to_string(),
        ));
    }
    options
        .into_iter()
        .map(|option| {
            if option.text.trim().is_empty() {
                return Err(AppError::Validation("Option text must not be empty".to_string()));
            }
            Ok(NewOption {
                weights: normalize_weights(catalog, option.weights)?,
                ..option
            })
        })
        .collect()
}

fn require_text(field: &str, value: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

pub fn validate_new_question(
    catalog: &CourseCatalog,
    question: NewQuestion,
) -> Result<NewQuestion, AppError> {
    require_text("Question text", &question.text)?;
    require_text("Category", &question.category)?;
    Ok(NewQuestion {
        options: normalize_options(catalog, question.options)?,
        ..question
    })
}

pub fn validate_update(
    catalog: &CourseCatalog,
    update: QuestionUpdate,
) -> Result<QuestionUpdate, AppError> {
    if let Some(text) = &update.text {
        require_text("Question text", text)?;
    }
    if let Some(category) = &update.category {
        require_text("Category", category)?;
    }
    let options = update
        .options
        .map(|o| normalize_options(catalog, o))
        .transpose()?;
    Ok(QuestionUpdate { options, ..update })
}

pub fn validate_submission(
    session_id: &str,
    responses: &[SubmittedResponse],
) -> Result<(), AppError> {
    require_text("session_id", session_id)?;
    if responses.is_empty() {
        return Err(AppError::Validation(
            "At least one response is required".to_string(),
        ));
    }
    if let Some(r) = responses.iter().find(|r| r.response_time_ms < 0) {
        return Err(AppError::Validation(format!(
            "response_time_ms for question {} must not be negative",
            r.question_id
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::QuestionType;

    fn option(weights: &[(&str, f64)]) -> NewOption {
        NewOption {
            text: "Opção".to_string(),
            value: "opt".to_string(),
            order: 1,
            weights: weights.iter().map(|(k, v)| (*k, *v)).collect(),
        }
    }

    #[test]
    fn test_normalize_fills_missing_and_strips_prefix() {
        let catalog = CourseCatalog::default();
        let w = normalize_weights(
            &catalog,
            [("weight_ti", 10.0), ("estetica", 2.0)].into_iter().collect(),
        )
        .unwrap();
        assert_eq!(w.0.len(), 5);
        assert_eq!(w.0["ti"], 10.0);
        assert_eq!(w.0["estetica"], 2.0);
        assert_eq!(w.0["enfermagem"], 0.0);
    }

    #[test]
    fn test_normalize_rejects_bad_weights() {
        let catalog = CourseCatalog::default();
        let bad: Vec<WeightVector> = vec![
            [("medicina", 1.0)].into_iter().collect(),
            [("ti", -1.0)].into_iter().collect(),
            [("ti", f64::INFINITY)].into_iter().collect(),
            [("ti", 1.0), ("weight_ti", 2.0)].into_iter().collect(),
        ];
        for w in bad {
            assert!(matches!(
                normalize_weights(&catalog, w),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn test_new_question_requires_options_and_text() {
        let catalog = CourseCatalog::default();
        let base = NewQuestion {
            text: "Qual área?".to_string(),
            question_type: QuestionType::MultipleChoice,
            category: "Interesse".to_string(),
            order: 1,
            is_active: true,
            options: vec![option(&[("ti", 1.0)])],
        };
        assert!(validate_new_question(&catalog, base.clone()).is_ok());

        let no_options = NewQuestion {
            options: vec![],
            ..base.clone()
        };
        assert!(validate_new_question(&catalog, no_options).is_err());

        let blank = NewQuestion {
            text: "  ".to_string(),
            ..base
        };
        assert!(validate_new_question(&catalog, blank).is_err());
    }

    #[test]
    fn test_update_normalizes_replacement_options() {
        let catalog = CourseCatalog::default();
        let update = validate_update(
            &catalog,
            QuestionUpdate {
                options: Some(vec![option(&[("weight_logistica", 4.0)])]),
                ..Default::default()
            },
        )
        .unwrap();
        let options = update.options.unwrap();
        assert_eq!(options[0].weights.0["logistica"], 4.0);
        assert_eq!(options[0].weights.0["ti"], 0.0);
    }

    #[test]
    fn test_submission_validation() {
        let answer = SubmittedResponse {
            question_id: 1,
            selected_option_id: 2,
            response_time_ms: 300,
        };
        assert!(validate_submission("s1", &[answer.clone()]).is_ok());
        assert!(validate_submission("", &[answer.clone()]).is_err());
        assert!(validate_submission("s1", &[]).is_err());
        let negative = SubmittedResponse {
            response_time_ms: -1,
            ..answer
        };
        assert!(validate_submission("s1", &[negative]).is_err());
    }
}
