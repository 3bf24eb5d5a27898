use std::sync::Arc;

use clap::Args;

use crate::infra::build_engine;
use examkit::error::AppError;
use examkit::exam::{
    generate_fixture_bank, AnswerSubmission, Domain, ExamBlueprint, ExamMode, OptionId,
    QuestionBank, StudentId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Number of questions to draw for the demo attempt.
    #[arg(long, default_value_t = 10)]
    pub(crate) questions: u32,
    /// Delivery mode: "exam" or "practice".
    #[arg(long, default_value = "exam", value_parser = parse_mode)]
    pub(crate) mode: ExamMode,
    /// Seed for the draw. Defaults to a random seed.
    #[arg(long)]
    pub(crate) seed: Option<u64>,
    /// How many questions to answer correctly. Defaults to all of them.
    #[arg(long)]
    pub(crate) correct: Option<u32>,
    /// Language tag for question text, e.g. "es".
    #[arg(long)]
    pub(crate) lang: Option<String>,
}

fn parse_mode(raw: &str) -> Result<ExamMode, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "exam" => Ok(ExamMode::Exam),
        "practice" => Ok(ExamMode::Practice),
        other => Err(format!("unknown mode '{other}', expected 'exam' or 'practice'")),
    }
}

/// Walk one attempt end to end against the fixture bank and print what a
/// learner would see at each step.
pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        questions,
        mode,
        seed,
        correct,
        lang,
    } = args;

    let bank = Arc::new(generate_fixture_bank(20));
    let engine = build_engine(bank.clone());
    let learner = StudentId("demo-learner".to_string());

    let blueprint = ExamBlueprint {
        mode,
        total_questions: questions,
        locale: "en".to_string(),
        domains: Domain::ALL.to_vec(),
        percentages: None,
        time_limit_minutes: 100,
    };

    println!("Exam delivery demo ({} mode, {questions} questions)", mode.label());

    let attempt = match seed {
        Some(seed) => engine
            .attempts
            .create_attempt_with_seed(&blueprint, learner.clone(), seed)?,
        None => engine.attempts.create_attempt(&blueprint, learner.clone())?,
    };
    println!("Attempt {} started at {}", attempt.id.0, attempt.started_at);

    let question_ids = engine.attempts.question_ids(&attempt.id)?;
    let answer_correctly = correct.unwrap_or(questions).min(questions) as usize;

    for (index, question_id) in question_ids.iter().enumerate() {
        let view = engine
            .attempts
            .question_view(&attempt.id, index as u32, lang.as_deref())?;
        println!("\n[{}] {} ({})", index + 1, view.stem, view.domain.display_name());
        for option in &view.options {
            println!("  {}. {}", option.label, option.text);
        }

        if index < answer_correctly {
            let selected: Vec<OptionId> = bank
                .find_by_id(*question_id)
                .map(|record| record.correct_option_ids().into_iter().collect())
                .unwrap_or_default();
            engine.attempts.submit_answer(
                &attempt.id,
                &AnswerSubmission {
                    question_id: *question_id,
                    selected_option_ids: selected,
                    marked: None,
                },
            )?;
            println!("  -> answered");
        } else {
            println!("  -> skipped");
        }
    }

    let status = engine.attempts.status(&attempt.id)?;
    println!(
        "\nProgress: {}/{} answered, {} marked",
        status.answered, status.total_questions, status.marked
    );

    let summary = engine.attempts.complete_attempt(&attempt.id)?;
    println!(
        "\nFinal score: {}% ({} correct, {} incorrect)",
        summary.score_percentage, summary.correct_count, summary.incorrect_count
    );
    println!("Domain breakdown:");
    for (domain, breakdown) in &summary.domain_breakdown {
        println!(
            "  - {}: {}/{} ({:.0}%)",
            domain.display_name(),
            breakdown.correct,
            breakdown.total,
            breakdown.percentage
        );
    }

    let rows = engine.history.attempt_history(&learner, None, 5)?;
    println!("\nHistory ({} completed attempt(s)):", rows.len());
    for row in rows {
        println!(
            "  - {} | {} | {}% | {} unanswered",
            row.id.0,
            row.mode.label(),
            row.score_percentage,
            row.unanswered_count
        );
    }

    Ok(())
}
