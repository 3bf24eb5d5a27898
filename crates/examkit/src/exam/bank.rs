use std::collections::BTreeMap;

use super::domain::{
    Difficulty, Domain, LocalizedText, OptionId, OptionRecord, QuestionId, QuestionRecord,
    QuestionType,
};

/// Read-only source of question records grouped by domain. Localized text
/// resolution, including the fallback-to-default policy, lives on the
/// records the bank hands out, not in the callers.
pub trait QuestionBank: Send + Sync {
    fn find_by_id(&self, id: QuestionId) -> Option<QuestionRecord>;
    fn find_by_domain(&self, domain: Domain) -> Vec<QuestionRecord>;
    fn count_by_domain(&self, domain: Domain) -> usize;
    fn total(&self) -> usize;

    fn find_by_domains(&self, domains: &[Domain]) -> Vec<QuestionRecord> {
        domains
            .iter()
            .flat_map(|domain| self.find_by_domain(*domain))
            .collect()
    }
}

/// Bank backed by a prebuilt index. Questions are immutable after
/// construction, so lookups never need interior mutability.
#[derive(Debug, Default, Clone)]
pub struct InMemoryQuestionBank {
    by_id: BTreeMap<QuestionId, QuestionRecord>,
    by_domain: BTreeMap<Domain, Vec<QuestionId>>,
}

impl InMemoryQuestionBank {
    pub fn new(questions: Vec<QuestionRecord>) -> Self {
        let mut by_id = BTreeMap::new();
        let mut by_domain: BTreeMap<Domain, Vec<QuestionId>> = BTreeMap::new();

        for question in questions {
            by_domain.entry(question.domain).or_default().push(question.id);
            by_id.insert(question.id, question);
        }

        Self { by_id, by_domain }
    }
}

impl QuestionBank for InMemoryQuestionBank {
    fn find_by_id(&self, id: QuestionId) -> Option<QuestionRecord> {
        self.by_id.get(&id).cloned()
    }

    fn find_by_domain(&self, domain: Domain) -> Vec<QuestionRecord> {
        self.by_domain
            .get(&domain)
            .into_iter()
            .flatten()
            .filter_map(|id| self.by_id.get(id).cloned())
            .collect()
    }

    fn count_by_domain(&self, domain: Domain) -> usize {
        self.by_domain.get(&domain).map_or(0, Vec::len)
    }

    fn total(&self) -> usize {
        self.by_id.len()
    }
}

/// Deterministic fixture content for demos and tests. Question ids are
/// assigned sequentially starting at `1`, cycling single, multi, and
/// yes/no shapes within each domain.
pub fn generate_fixture_bank(questions_per_domain: usize) -> InMemoryQuestionBank {
    let mut questions = Vec::new();
    let mut next_question_id = 1u64;
    let mut next_option_id = 1u64;

    for domain in Domain::ALL {
        for ordinal in 0..questions_per_domain {
            let qtype = match ordinal % 3 {
                0 => QuestionType::Single,
                1 => QuestionType::Multi,
                _ => QuestionType::YesNo,
            };
            let difficulty = match ordinal % 3 {
                0 => Difficulty::Easy,
                1 => Difficulty::Medium,
                _ => Difficulty::Hard,
            };

            questions.push(generate_question(
                QuestionId(next_question_id),
                domain,
                difficulty,
                qtype,
                ordinal,
                &mut next_option_id,
            ));
            next_question_id += 1;
        }
    }

    InMemoryQuestionBank::new(questions)
}

fn generate_question(
    id: QuestionId,
    domain: Domain,
    difficulty: Difficulty,
    qtype: QuestionType,
    ordinal: usize,
    next_option_id: &mut u64,
) -> QuestionRecord {
    let stem = LocalizedText::new(format!(
        "[{}] Scenario {}: which configuration satisfies the stated requirement?",
        domain.display_name(),
        ordinal + 1
    ))
    .with_translation(
        "es",
        format!(
            "[{}] Escenario {}: ¿qué configuración cumple el requisito indicado?",
            domain.display_name(),
            ordinal + 1
        ),
    );

    let explanation = LocalizedText::new(format!(
        "Review the {} documentation for scenario {}.",
        domain.display_name(),
        ordinal + 1
    ));

    let option_specs: &[(&str, bool)] = match qtype {
        QuestionType::YesNo => &[("Yes", true), ("No", false)],
        QuestionType::Multi => &[("A", true), ("B", true), ("C", false), ("D", false)],
        _ => &[("A", true), ("B", false), ("C", false), ("D", false)],
    };

    let options = option_specs
        .iter()
        .map(|(label, is_correct)| {
            let option = OptionRecord {
                id: OptionId(*next_option_id),
                label: (*label).to_string(),
                text: LocalizedText::new(format!("Option {label} for scenario {}", ordinal + 1)),
                is_correct: *is_correct,
            };
            *next_option_id += 1;
            option
        })
        .collect();

    QuestionRecord {
        id,
        domain,
        difficulty,
        qtype,
        stem,
        explanation,
        tags: vec![domain.display_name().to_string()],
        options,
    }
}
