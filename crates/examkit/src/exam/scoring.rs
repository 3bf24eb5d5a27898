use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::bank::QuestionBank;
use super::domain::{Attempt, AttemptId, Domain, OptionId, QuestionId};

/// Per-domain correct/total aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainBreakdown {
    pub correct: u32,
    pub total: u32,
    pub percentage: f64,
}

/// Grading detail for a single slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionResult {
    pub question_id: QuestionId,
    pub position: u32,
    pub domain: Domain,
    pub correct_option_ids: Vec<OptionId>,
    pub selected_option_ids: Vec<OptionId>,
    pub is_correct: bool,
    pub answered: bool,
}

/// Graded outcome of a completed attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub attempt_id: AttemptId,
    pub total_questions: u32,
    pub correct_count: u32,
    pub incorrect_count: u32,
    pub score_percentage: u8,
    pub duration_seconds: Option<i64>,
    pub average_seconds_per_question: Option<f64>,
    pub domain_breakdown: BTreeMap<Domain, DomainBreakdown>,
    pub question_results: Vec<QuestionResult>,
}

/// Grade an attempt. Pure: no side effects, and identical inputs always
/// produce an identical summary; persisting the result is the caller's job.
///
/// A slot is correct iff its selected option-id set equals the question's
/// correct-option set exactly. The one rule covers single-choice,
/// multi-choice, and yes/no uniformly since all are modeled as id sets; an
/// empty selection can never equal a non-empty correct set, so unanswered
/// slots land in the incorrect count rather than a third bucket.
pub fn score_attempt(attempt: &Attempt, bank: &dyn QuestionBank) -> ResultSummary {
    let mut slots = attempt.slots.clone();
    slots.sort_by_key(|slot| slot.position);

    let mut domain_breakdown: BTreeMap<Domain, DomainBreakdown> = Domain::ALL
        .iter()
        .map(|domain| {
            (
                *domain,
                DomainBreakdown {
                    correct: 0,
                    total: 0,
                    percentage: 0.0,
                },
            )
        })
        .collect();

    let mut correct_count = 0u32;
    let mut question_results = Vec::with_capacity(slots.len());

    for slot in &slots {
        let Some(question) = bank.find_by_id(slot.question_id) else {
            tracing::warn!(
                question_id = slot.question_id.0,
                attempt = %attempt.id.0,
                "question missing from bank while scoring, skipping slot"
            );
            continue;
        };

        let correct_ids = question.correct_option_ids();
        let selected_ids = slot.selected_option_ids();
        let is_correct = selected_ids == correct_ids;

        let breakdown = domain_breakdown
            .entry(question.domain)
            .or_insert(DomainBreakdown {
                correct: 0,
                total: 0,
                percentage: 0.0,
            });
        breakdown.total += 1;
        if is_correct {
            breakdown.correct += 1;
            correct_count += 1;
        }

        question_results.push(QuestionResult {
            question_id: question.id,
            position: slot.position,
            domain: question.domain,
            correct_option_ids: correct_ids.into_iter().collect(),
            selected_option_ids: selected_ids.into_iter().collect(),
            is_correct,
            answered: slot.is_answered(),
        });
    }

    for breakdown in domain_breakdown.values_mut() {
        if breakdown.total > 0 {
            breakdown.percentage = f64::from(breakdown.correct) * 100.0 / f64::from(breakdown.total);
        }
    }

    let total = attempt.total_questions;
    let score_percentage = if total > 0 {
        (f64::from(correct_count) * 100.0 / f64::from(total)).round() as u8
    } else {
        0
    };

    let average_seconds_per_question = attempt
        .duration_seconds
        .filter(|_| total > 0)
        .map(|seconds| seconds as f64 / f64::from(total));

    ResultSummary {
        attempt_id: attempt.id.clone(),
        total_questions: total,
        correct_count,
        incorrect_count: total - correct_count,
        score_percentage,
        duration_seconds: attempt.duration_seconds,
        average_seconds_per_question,
        domain_breakdown,
        question_results,
    }
}
