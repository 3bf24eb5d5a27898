use std::collections::{BTreeMap, BTreeSet};

use crate::exam::bank::InMemoryQuestionBank;
use crate::exam::domain::{Domain, QuestionId, QuestionRecord, QuestionType};
use crate::exam::selector::{quotas_for, QuestionSelector, SelectionError};

use super::common::{fixture_bank, percentages, question_with_options};

fn domain_counts(selected: &[QuestionRecord]) -> BTreeMap<Domain, u32> {
    let mut counts = BTreeMap::new();
    for question in selected {
        *counts.entry(question.domain).or_insert(0) += 1;
    }
    counts
}

#[test]
fn uniform_draw_returns_requested_unique_questions() {
    let bank = fixture_bank(20);
    let mut selector = QuestionSelector::with_seed(7);

    let selected = selector
        .draw(bank.as_ref(), &Domain::ALL, 50, None)
        .expect("bank holds enough questions");

    assert_eq!(selected.len(), 50);
    let ids: BTreeSet<QuestionId> = selected.iter().map(|question| question.id).collect();
    assert_eq!(ids.len(), 50);
}

#[test]
fn quotas_round_half_up() {
    let shares = percentages(&[
        (Domain::IdentityGovernance, 23),
        (Domain::Storage, 18),
        (Domain::Compute, 23),
        (Domain::Networking, 18),
        (Domain::MonitorMaintain, 18),
    ]);

    let quotas = quotas_for(&Domain::ALL, 50, &shares);

    assert_eq!(quotas[&Domain::IdentityGovernance], 12);
    assert_eq!(quotas[&Domain::Storage], 9);
    assert_eq!(quotas[&Domain::Compute], 12);
    assert_eq!(quotas[&Domain::Networking], 9);
    assert_eq!(quotas[&Domain::MonitorMaintain], 9);
    assert_eq!(quotas.values().sum::<u32>(), 51);
}

#[test]
fn weighted_draw_clamps_rounding_overshoot_to_requested_total() {
    let bank = fixture_bank(20);
    let shares = percentages(&[
        (Domain::IdentityGovernance, 23),
        (Domain::Storage, 18),
        (Domain::Compute, 23),
        (Domain::Networking, 18),
        (Domain::MonitorMaintain, 18),
    ]);
    let mut selector = QuestionSelector::with_seed(21);

    let selected = selector
        .draw(bank.as_ref(), &Domain::ALL, 50, Some(&shares))
        .expect("draw succeeds");

    assert_eq!(selected.len(), 50);
    let ids: BTreeSet<QuestionId> = selected.iter().map(|question| question.id).collect();
    assert_eq!(ids.len(), 50);

    // Quotas sum to 51, so truncation drops exactly one question from one
    // domain; every domain stays within one of its quota.
    let quotas = quotas_for(&Domain::ALL, 50, &shares);
    let counts = domain_counts(&selected);
    let mut at_quota = 0;
    for domain in Domain::ALL {
        let count = counts.get(&domain).copied().unwrap_or(0);
        let quota = quotas[&domain];
        assert!(count == quota || count == quota - 1);
        if count == quota {
            at_quota += 1;
        }
    }
    assert_eq!(at_quota, 4);
}

#[test]
fn rounding_shortfall_goes_to_first_domain() {
    let bank = fixture_bank(20);
    let shares = percentages(&[
        (Domain::IdentityGovernance, 20),
        (Domain::Storage, 20),
        (Domain::Compute, 20),
        (Domain::Networking, 20),
        (Domain::MonitorMaintain, 10),
    ]);
    let mut selector = QuestionSelector::with_seed(4);

    let selected = selector
        .draw(bank.as_ref(), &Domain::ALL, 50, Some(&shares))
        .expect("draw succeeds");

    let counts = domain_counts(&selected);
    assert_eq!(counts[&Domain::IdentityGovernance], 15);
    assert_eq!(counts[&Domain::Storage], 10);
    assert_eq!(counts[&Domain::Compute], 10);
    assert_eq!(counts[&Domain::Networking], 10);
    assert_eq!(counts[&Domain::MonitorMaintain], 5);
}

#[test]
fn insufficient_bank_is_a_fatal_error() {
    let bank = fixture_bank(6);
    let mut selector = QuestionSelector::with_seed(1);

    let err = selector
        .draw(bank.as_ref(), &Domain::ALL, 50, None)
        .expect_err("30 questions cannot satisfy a draw of 50");

    assert_eq!(
        err,
        SelectionError::InsufficientQuestions {
            requested: 50,
            available: 30,
        }
    );
}

#[test]
fn exhausted_domain_pool_caps_its_quota() {
    let mut questions = Vec::new();
    for id in 1..=20 {
        questions.push(question_with_options(
            id,
            Domain::IdentityGovernance,
            QuestionType::Single,
            &[(id * 10, true), (id * 10 + 1, false)],
        ));
    }
    questions.push(question_with_options(
        100,
        Domain::Storage,
        QuestionType::Single,
        &[(1000, true), (1001, false)],
    ));
    questions.push(question_with_options(
        101,
        Domain::Storage,
        QuestionType::Single,
        &[(1010, true), (1011, false)],
    ));
    let bank = InMemoryQuestionBank::new(questions);

    let shares = percentages(&[(Domain::IdentityGovernance, 80), (Domain::Storage, 40)]);
    let domains = [Domain::IdentityGovernance, Domain::Storage];
    let mut selector = QuestionSelector::with_seed(5);

    // Quota asks Storage for 8 but only 2 exist, so the draw comes up short.
    let err = selector
        .draw(&bank, &domains, 20, Some(&shares))
        .expect_err("storage pool is exhausted");

    assert_eq!(
        err,
        SelectionError::InsufficientQuestions {
            requested: 20,
            available: 18,
        }
    );
}

#[test]
fn seeded_draw_is_reproducible() {
    let bank = fixture_bank(20);

    let first: Vec<QuestionId> = QuestionSelector::with_seed(99)
        .draw(bank.as_ref(), &Domain::ALL, 50, None)
        .expect("draw succeeds")
        .iter()
        .map(|question| question.id)
        .collect();
    let second: Vec<QuestionId> = QuestionSelector::with_seed(99)
        .draw(bank.as_ref(), &Domain::ALL, 50, None)
        .expect("draw succeeds")
        .iter()
        .map(|question| question.id)
        .collect();
    let other_seed: Vec<QuestionId> = QuestionSelector::with_seed(100)
        .draw(bank.as_ref(), &Domain::ALL, 50, None)
        .expect("draw succeeds")
        .iter()
        .map(|question| question.id)
        .collect();

    assert_eq!(first, second);
    assert_ne!(first, other_seed);
}
