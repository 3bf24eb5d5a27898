use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use examkit::exam::{ExamEngine, InMemoryAttemptRepository, InMemoryQuestionBank, InMemorySessionRepository};
use metrics_exporter_prometheus::PrometheusHandle;

/// Engine wired to the in-memory stores this service ships with.
pub(crate) type MemoryEngine =
    ExamEngine<InMemoryQuestionBank, InMemorySessionRepository, InMemoryAttemptRepository>;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn build_engine(bank: Arc<InMemoryQuestionBank>) -> MemoryEngine {
    ExamEngine::new(
        bank,
        Arc::new(InMemorySessionRepository::default()),
        Arc::new(InMemoryAttemptRepository::default()),
    )
}
