use std::path::Path;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::{info, warn};
use uuid::Uuid;

use crate::directory::Directory;
use crate::errors::SubmissionError;
use crate::models::{Assessment, Ballot, PeriodStatus, Role, ScoreInput, Subject, VoteCategory};
use crate::validate;

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Postgres-backed directory over the `cohort_leaderboard` schema.
#[derive(Clone)]
pub struct PgDirectory {
    pool: PgPool,
}

impl PgDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn subject_from_row(row: &PgRow) -> anyhow::Result<Subject> {
    let role: String = row.try_get("role")?;
    Ok(Subject {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        display_name: row.try_get("display_name")?,
        role: role.parse::<Role>().map_err(anyhow::Error::msg)?,
        department: row.try_get("department")?,
        cohort: row.try_get("cohort")?,
    })
}

#[async_trait]
impl Directory for PgDirectory {
    async fn list_subjects(&self) -> anyhow::Result<Vec<Subject>> {
        let rows = sqlx::query(
            "SELECT id, username, display_name, role, department, cohort \
             FROM cohort_leaderboard.subjects ORDER BY username",
        )
        .fetch_all(&self.pool)
        .await
        .context("failed to load subjects")?;

        rows.iter().map(subject_from_row).collect()
    }

    async fn list_assessments(&self, period: &str) -> anyhow::Result<Vec<Assessment>> {
        let rows = sqlx::query(
            "SELECT evaluator_id, target_id, period, attitude_score, teamwork_score, \
             feedback, submitted_at \
             FROM cohort_leaderboard.assessments WHERE period = $1",
        )
        .bind(period)
        .fetch_all(&self.pool)
        .await
        .context("failed to load assessments")?;

        let mut assessments = Vec::with_capacity(rows.len());
        for row in rows {
            assessments.push(Assessment {
                evaluator_id: row.get("evaluator_id"),
                target_id: row.get("target_id"),
                period: row.get("period"),
                attitude_score: row.get("attitude_score"),
                teamwork_score: row.get("teamwork_score"),
                feedback: row.get("feedback"),
                submitted_at: row.get("submitted_at"),
            });
        }
        Ok(assessments)
    }

    async fn list_ballots(&self, period: &str) -> anyhow::Result<Vec<Ballot>> {
        let rows = sqlx::query(
            "SELECT voter_id, candidate_id, period, category \
             FROM cohort_leaderboard.ballots WHERE period = $1",
        )
        .bind(period)
        .fetch_all(&self.pool)
        .await
        .context("failed to load ballots")?;

        let mut ballots = Vec::with_capacity(rows.len());
        for row in rows {
            let category: String = row.get("category");
            ballots.push(Ballot {
                voter_id: row.get("voter_id"),
                candidate_id: row.get("candidate_id"),
                period: row.get("period"),
                category: category.parse().map_err(anyhow::Error::msg)?,
            });
        }
        Ok(ballots)
    }

    async fn period_published(&self, period: &str) -> anyhow::Result<bool> {
        Ok(period_status(&self.pool, period).await?.published)
    }
}

pub async fn period_status(pool: &PgPool, period: &str) -> anyhow::Result<PeriodStatus> {
    let row = sqlx::query(
        "SELECT published, published_at FROM cohort_leaderboard.periods WHERE period = $1",
    )
    .bind(period)
    .fetch_optional(pool)
    .await
    .context("failed to load period status")?;

    Ok(row.map_or_else(PeriodStatus::default, |row| {
        PeriodStatus::from_columns(row.get("published"), row.get("published_at"))
    }))
}

pub async fn set_published(pool: &PgPool, period: &str, published: bool) -> anyhow::Result<()> {
    let published_at = published.then(Utc::now);
    sqlx::query(
        r#"
        INSERT INTO cohort_leaderboard.periods (period, published, published_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (period) DO UPDATE
        SET published = EXCLUDED.published, published_at = EXCLUDED.published_at
        "#,
    )
    .bind(period)
    .bind(published)
    .bind(published_at)
    .execute(pool)
    .await?;
    info!(period, published, "period publication updated");
    Ok(())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db_err| db_err.is_unique_violation())
}

/// Turns a unique-key conflict into `duplicate`; anything else keeps the
/// driver error under `action`.
fn map_insert_error(err: sqlx::Error, duplicate: SubmissionError, action: &'static str) -> anyhow::Error {
    if is_unique_violation(&err) {
        duplicate.into()
    } else {
        anyhow::Error::new(err).context(action)
    }
}

fn is_duplicate(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SubmissionError>(),
        Some(SubmissionError::DuplicateSubmission(..))
    )
}

/// Stores a validated assessment. A concurrent duplicate that slipped past
/// validation surfaces as [`SubmissionError::DuplicateSubmission`].
pub async fn insert_assessment(pool: &PgPool, assessment: &Assessment) -> anyhow::Result<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO cohort_leaderboard.assessments
        (id, evaluator_id, target_id, period, attitude_score, teamwork_score, feedback)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(assessment.evaluator_id)
    .bind(assessment.target_id)
    .bind(&assessment.period)
    .bind(assessment.attitude_score)
    .bind(assessment.teamwork_score)
    .bind(&assessment.feedback)
    .execute(pool)
    .await;

    result.map(|_| ()).map_err(|err| {
        map_insert_error(
            err,
            SubmissionError::duplicate_assessment(&assessment.period),
            "failed to store assessment",
        )
    })
}

/// Stores ballots in one transaction so a paired submission lands whole.
pub async fn insert_ballots(pool: &PgPool, ballots: &[Ballot]) -> anyhow::Result<()> {
    let mut tx = pool.begin().await?;
    for ballot in ballots {
        let result = sqlx::query(
            r#"
            INSERT INTO cohort_leaderboard.ballots
            (id, voter_id, candidate_id, period, category)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(ballot.voter_id)
        .bind(ballot.candidate_id)
        .bind(&ballot.period)
        .bind(ballot.category.as_str())
        .execute(&mut *tx)
        .await;

        if let Err(err) = result {
            return Err(map_insert_error(
                err,
                SubmissionError::duplicate_ballot(&ballot.period),
                "failed to store ballot",
            ));
        }
    }
    tx.commit().await?;
    Ok(())
}

pub async fn submit_assessment(
    directory: &PgDirectory,
    period: &str,
    evaluator: &str,
    target: &str,
    scores: ScoreInput,
) -> anyhow::Result<Assessment> {
    let roster = directory.list_subjects().await?;
    let existing = directory.list_assessments(period).await?;
    let evaluator = validate::find_subject(&roster, evaluator)?;
    let target = validate::find_subject(&roster, target)?;

    let assessment = validate::validate_assessment(evaluator, target, period, scores, &existing)?;
    insert_assessment(directory.pool(), &assessment).await?;
    info!(
        period,
        evaluator = %evaluator.username,
        target = %target.username,
        "assessment recorded"
    );
    Ok(assessment)
}

pub async fn submit_ballots(
    directory: &PgDirectory,
    period: &str,
    voter: &str,
    peer_pick: &str,
    leader_pick: &str,
) -> anyhow::Result<[Ballot; 2]> {
    let roster = directory.list_subjects().await?;
    let existing = directory.list_ballots(period).await?;
    let voter = validate::find_subject(&roster, voter)?;
    let peer_pick = validate::find_subject(&roster, peer_pick)?;
    let leader_pick = validate::find_subject(&roster, leader_pick)?;

    let ballots = validate::validate_ballot_pair(voter, peer_pick, leader_pick, period, &existing)?;
    insert_ballots(directory.pool(), &ballots).await?;
    info!(period, voter = %voter.username, "ballots recorded");
    Ok(ballots)
}

#[derive(Debug, Deserialize)]
pub struct SubjectCsvRow {
    pub username: String,
    pub display_name: String,
    pub role: String,
    pub department: Option<String>,
    pub cohort: String,
}

#[derive(Debug, Deserialize)]
pub struct AssessmentCsvRow {
    pub evaluator: String,
    pub target: String,
    pub attitude_score: i32,
    pub teamwork_score: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BallotCsvRow {
    pub voter: String,
    pub candidate: String,
    pub category: String,
}

pub fn read_csv<T: serde::de::DeserializeOwned>(csv_path: &Path) -> anyhow::Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;

    let mut rows = Vec::new();
    for (line, result) in reader.deserialize::<T>().enumerate() {
        rows.push(result.with_context(|| format!("invalid CSV record {}", line + 1))?);
    }
    Ok(rows)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub rejected: usize,
}

pub async fn import_subjects(pool: &PgPool, csv_path: &Path) -> anyhow::Result<ImportSummary> {
    let rows: Vec<SubjectCsvRow> = read_csv(csv_path)?;
    let mut summary = ImportSummary::default();

    for row in rows {
        let role = match row.role.parse::<Role>() {
            Ok(role) => role,
            Err(reason) => {
                warn!(username = %row.username, %reason, "skipping subject");
                summary.rejected += 1;
                continue;
            }
        };

        sqlx::query(
            r#"
            INSERT INTO cohort_leaderboard.subjects
            (id, username, display_name, role, department, cohort)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (username) DO UPDATE
            SET display_name = EXCLUDED.display_name,
                role = EXCLUDED.role,
                department = EXCLUDED.department,
                cohort = EXCLUDED.cohort
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&row.username)
        .bind(&row.display_name)
        .bind(role.as_str())
        .bind(row.department.as_deref().unwrap_or("-"))
        .bind(&row.cohort)
        .execute(pool)
        .await
        .context("failed to store subject")?;
        summary.inserted += 1;
    }

    Ok(summary)
}

/// Imports assessment rows through the validator. Rejected rows are logged
/// and counted, never stored.
pub async fn import_assessments(
    directory: &PgDirectory,
    period: &str,
    csv_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let rows: Vec<AssessmentCsvRow> = read_csv(csv_path)?;
    let roster = directory.list_subjects().await?;
    let mut existing = directory.list_assessments(period).await?;
    let mut summary = ImportSummary::default();

    for row in rows {
        let scores = ScoreInput {
            attitude: row.attitude_score,
            teamwork: row.teamwork_score,
            feedback: row.feedback,
        };
        let checked = validate::find_subject(&roster, &row.evaluator).and_then(|evaluator| {
            let target = validate::find_subject(&roster, &row.target)?;
            validate::validate_assessment(evaluator, target, period, scores, &existing)
        });

        match checked {
            Ok(assessment) => {
                let stored = insert_assessment(directory.pool(), &assessment).await;
                match stored {
                    Ok(()) => {
                        existing.push(assessment);
                        summary.inserted += 1;
                    }
                    Err(err) if is_duplicate(&err) => {
                        warn!(evaluator = %row.evaluator, target = %row.target, reason = %err, "skipping assessment");
                        summary.rejected += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(reason) => {
                warn!(evaluator = %row.evaluator, target = %row.target, %reason, "skipping assessment");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}

pub async fn import_ballots(
    directory: &PgDirectory,
    period: &str,
    csv_path: &Path,
) -> anyhow::Result<ImportSummary> {
    let rows: Vec<BallotCsvRow> = read_csv(csv_path)?;
    let roster = directory.list_subjects().await?;
    let mut existing = directory.list_ballots(period).await?;
    let mut summary = ImportSummary::default();

    for row in rows {
        let category = match row.category.parse::<VoteCategory>() {
            Ok(category) => category,
            Err(reason) => {
                warn!(voter = %row.voter, %reason, "skipping ballot");
                summary.rejected += 1;
                continue;
            }
        };
        let checked = validate::find_subject(&roster, &row.voter).and_then(|voter| {
            let candidate = validate::find_subject(&roster, &row.candidate)?;
            validate::validate_ballot(voter, candidate, period, category, &existing)
        });

        match checked {
            Ok(ballot) => {
                let stored = insert_ballots(directory.pool(), std::slice::from_ref(&ballot)).await;
                match stored {
                    Ok(()) => {
                        existing.push(ballot);
                        summary.inserted += 1;
                    }
                    Err(err) if is_duplicate(&err) => {
                        warn!(voter = %row.voter, candidate = %row.candidate, reason = %err, "skipping ballot");
                        summary.rejected += 1;
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(reason) => {
                warn!(voter = %row.voter, candidate = %row.candidate, %reason, "skipping ballot");
                summary.rejected += 1;
            }
        }
    }

    Ok(summary)
}

pub async fn seed(directory: &PgDirectory, period: &str) -> anyhow::Result<()> {
    let subjects = vec![
        ("0f6f2a57-3c1e-4f0a-9a52-1d1a9b8f0a01", "admin", "System Admin", Role::Admin, "-"),
        ("5b2c9a0e-7d43-4c6b-8f1e-2e2b7c9d0a02", "rina.board", "Rina Maharani", Role::Board, "Board"),
        ("9c4e1b7a-2f58-4d3e-a6c1-3f3c8d0e1b03", "hadi.advisory", "Hadi Pratama", Role::Advisory, "Advisory"),
        ("1d7a3c5e-9b24-4a8f-b3d2-4a4d9e1f2c04", "bayu.head", "Bayu Saputra", Role::DepartmentHead, "Outreach"),
        ("3e8b4d6f-0c35-4b9a-84e3-5b5eaf203d05", "sari.member", "Sari Wulandari", Role::Member, "Outreach"),
        ("7f9c5e70-1d46-4cab-95f4-6c6fb0314e06", "dimas.member", "Dimas Kurniawan", Role::Member, "Outreach"),
        ("2a0d6f81-2e57-4dbc-a605-7d70c1425f07", "ayu.member", "Ayu Lestari", Role::Member, "Events"),
    ];

    for (id, username, display_name, role, department) in subjects {
        sqlx::query(
            r#"
            INSERT INTO cohort_leaderboard.subjects
            (id, username, display_name, role, department, cohort)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (username) DO UPDATE
            SET display_name = EXCLUDED.display_name, role = EXCLUDED.role
            "#,
        )
        .bind(Uuid::parse_str(id)?)
        .bind(username)
        .bind(display_name)
        .bind(role.as_str())
        .bind(department)
        .bind("2026")
        .execute(directory.pool())
        .await?;
    }

    let assessments = [
        ("rina.board", "sari.member", 85, None),
        ("hadi.advisory", "sari.member", 78, None),
        ("bayu.head", "sari.member", 88, Some(82)),
        ("rina.board", "dimas.member", 72, None),
        ("bayu.head", "dimas.member", 80, Some(90)),
        ("rina.board", "bayu.head", 91, None),
        ("hadi.advisory", "bayu.head", 87, None),
        ("rina.board", "ayu.member", 76, None),
    ];

    let roster = directory.list_subjects().await?;
    let mut existing = directory.list_assessments(period).await?;
    for (evaluator, target, attitude, teamwork) in assessments {
        let evaluator = validate::find_subject(&roster, evaluator)?;
        let target = validate::find_subject(&roster, target)?;
        let scores = ScoreInput {
            attitude,
            teamwork,
            feedback: Some("Seeded assessment".to_string()),
        };
        match validate::validate_assessment(evaluator, target, period, scores, &existing) {
            Ok(assessment) => {
                let stored = insert_assessment(directory.pool(), &assessment).await;
                match stored {
                    Ok(()) => existing.push(assessment),
                    Err(err) if is_duplicate(&err) => {}
                    Err(err) => return Err(err),
                }
            }
            Err(SubmissionError::DuplicateSubmission(..)) => {}
            Err(err) => return Err(err.into()),
        }
    }

    let ballots = [
        ("sari.member", "dimas.member", "bayu.head"),
        ("dimas.member", "ayu.member", "bayu.head"),
        ("ayu.member", "dimas.member", "rina.board"),
    ];

    let mut existing = directory.list_ballots(period).await?;
    for (voter, peer, leader) in ballots {
        let voter = validate::find_subject(&roster, voter)?;
        let peer = validate::find_subject(&roster, peer)?;
        let leader = validate::find_subject(&roster, leader)?;
        match validate::validate_ballot_pair(voter, peer, leader, period, &existing) {
            Ok(pair) => {
                let stored = insert_ballots(directory.pool(), &pair).await;
                match stored {
                    Ok(()) => existing.extend(pair),
                    Err(err) if is_duplicate(&err) => {}
                    Err(err) => return Err(err),
                }
            }
            Err(SubmissionError::DuplicateSubmission(..)) => {}
            Err(err) => return Err(err.into()),
        }
    }

    Ok(())
}
