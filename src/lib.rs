//! Scoring, vote tallying and role-gated leaderboards for cohort recognition
//! rounds.
//!
//! The engine modules (`permissions`, `validate`, `scoring`, `tally`,
//! `visibility`) are synchronous and storage-agnostic; `db` supplies the
//! Postgres-backed [`directory::Directory`].

pub mod db;
pub mod directory;
pub mod errors;
pub mod models;
pub mod permissions;
pub mod report;
pub mod scoring;
pub mod tally;
pub mod validate;
pub mod visibility;

pub use errors::SubmissionError;
pub use visibility::{can_view_results, get_leaderboard, get_vote_tally, Gated};
