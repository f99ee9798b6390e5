//! Sample question bank, created the first time an empty bank is listed.

use tracing::info;

use crate::errors::AppError;
use crate::models::question::{NewOption, NewQuestion, QuestionType};
use crate::questionnaire::repository::Repository;
use crate::recommendation::scorer::WeightVector;

/// Weight columns in the order of the default catalog.
const COURSE_KEYS: [&str; 5] = ["ti", "enfermagem", "logistica", "administracao", "estetica"];

type SampleOption = (&'static str, &'static str, [f64; 5]);

const SAMPLES: [(&str, &str, &[SampleOption]); 3] = [
    (
        "Qual área de conhecimento mais desperta seu interesse?",
        "Interesse Acadêmico",
        &[
            ("Tecnologia e Computação", "tech", [10.0, 2.0, 3.0, 4.0, 1.0]),
            ("Ciências da Saúde", "health", [2.0, 10.0, 1.0, 3.0, 4.0]),
            ("Gestão e Negócios", "business", [3.0, 2.0, 8.0, 10.0, 2.0]),
            ("Arte e Beleza", "beauty", [1.0, 3.0, 2.0, 2.0, 10.0]),
            ("Logística e Operações", "logistics", [4.0, 1.0, 10.0, 6.0, 1.0]),
        ],
    ),
    (
        "Como você prefere trabalhar?",
        "Estilo de Trabalho",
        &[
            ("Sozinho, focado em projetos técnicos", "solo_tech", [9.0, 3.0, 4.0, 2.0, 5.0]),
            ("Em equipe, cuidando de pessoas", "team_care", [3.0, 9.0, 5.0, 7.0, 8.0]),
            ("Coordenando processos e pessoas", "coordination", [4.0, 5.0, 9.0, 9.0, 3.0]),
            ("Criando e transformando", "creative", [5.0, 4.0, 2.0, 3.0, 9.0]),
        ],
    ),
    (
        "Qual ambiente de trabalho você prefere?",
        "Ambiente de Trabalho",
        &[
            ("Escritório com computadores", "office_tech", [9.0, 2.0, 6.0, 8.0, 3.0]),
            ("Hospital ou clínica", "healthcare", [1.0, 10.0, 1.0, 2.0, 3.0]),
            ("Armazém ou centro de distribuição", "warehouse", [3.0, 2.0, 10.0, 4.0, 1.0]),
            ("Salão de beleza ou spa", "salon", [1.0, 3.0, 1.0, 2.0, 10.0]),
        ],
    ),
];

pub fn sample_questions() -> Vec<NewQuestion> {
    SAMPLES
        .iter()
        .zip(1..)
        .map(|(&(text, category, options), order)| NewQuestion {
            text: text.to_string(),
            question_type: QuestionType::MultipleChoice,
            category: category.to_string(),
            order,
            is_active: true,
            options: options
                .iter()
                .zip(1..)
                .map(|(&(text, value, weights), order)| NewOption {
                    text: text.to_string(),
                    value: value.to_string(),
                    order,
                    weights: COURSE_KEYS.iter().copied().zip(weights).collect::<WeightVector>(),
                })
                .collect(),
        })
        .collect()
}

/// Creates every sample question whose text is not already in the bank.
/// Returns how many were created. Safe to run concurrently.
pub async fn seed_sample_questions(repo: &dyn Repository) -> Result<usize, AppError> {
    let mut created = 0;
    for sample in sample_questions() {
        if repo.create_question_if_absent(sample).await?.is_some() {
            created += 1;
        }
    }
    if created > 0 {
        info!("Seeded {created} sample questions");
    }
    Ok(created)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questionnaire::repository::MemoryRepository;
    use crate::recommendation::courses::CourseCatalog;

    #[test]
    fn test_samples_cover_every_catalog_course() {
        let catalog = CourseCatalog::default();
        for q in sample_questions() {
            for o in &q.options {
                for key in catalog.keys() {
                    assert!(o.weights.0.contains_key(key), "{} lacks {key}", o.value);
                }
            }
        }
    }

    #[tokio::test]
    async fn test_seeding_is_idempotent() {
        let repo = MemoryRepository::new();
        assert_eq!(seed_sample_questions(&repo).await.unwrap(), 3);
        assert_eq!(seed_sample_questions(&repo).await.unwrap(), 0);

        let questions = repo.list_questions(true).await.unwrap();
        assert_eq!(questions.len(), 3);
        assert_eq!(questions[0].options.len(), 5);
        assert_eq!(questions[0].order, 1);
    }

    #[tokio::test]
    async fn test_concurrent_seeding_creates_each_sample_once() {
        let repo = MemoryRepository::new();
        let (a, b) = tokio::join!(seed_sample_questions(&repo), seed_sample_questions(&repo));
        assert_eq!(a.unwrap() + b.unwrap(), 3);
        assert_eq!(repo.list_questions(false).await.unwrap().len(), 3);
    }
}
