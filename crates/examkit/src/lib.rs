//! Core engine for delivering timed and practice multiple-choice exams.
//!
//! The crate is organized around four collaborating components: a seeded,
//! quota-weighted question [`selector`](crate::exam::selector), a write-once
//! position-ordered [session store](crate::exam::session), a per-learner
//! [attempt tracker](crate::exam::attempt), and a pure
//! [scoring function](crate::exam::scoring). Persistence sits behind the
//! repository traits in [`exam::repository`] so the engine can be exercised
//! against in-memory state.

pub mod config;
pub mod error;
pub mod exam;
pub mod telemetry;
