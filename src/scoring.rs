use std::cmp::Ordering;
use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{Assessment, CompositeScore, LeaderboardEntry, Subject};

#[derive(Default)]
struct Totals {
    attitude_sum: i64,
    teamwork_sum: i64,
    teamwork_rows: usize,
    rows: usize,
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Folds a period's assessment rows into one composite per assessed subject.
///
/// Subjects without any rows get no composite at all.
pub fn composite_scores(assessments: &[Assessment]) -> HashMap<Uuid, CompositeScore> {
    let mut totals: HashMap<Uuid, Totals> = HashMap::new();

    for row in assessments {
        let entry = totals.entry(row.target_id).or_default();
        entry.rows += 1;
        entry.attitude_sum += i64::from(row.attitude_score);
        if let Some(teamwork) = row.teamwork_score {
            entry.teamwork_sum += i64::from(teamwork);
            entry.teamwork_rows += 1;
        }
    }

    totals
        .into_iter()
        .map(|(subject_id, totals)| (subject_id, composite_from(subject_id, &totals)))
        .collect()
}

fn composite_from(subject_id: Uuid, totals: &Totals) -> CompositeScore {
    let avg_attitude = round_to(totals.attitude_sum as f64 / totals.rows as f64, 1);
    let avg_teamwork = (totals.teamwork_rows > 0)
        .then(|| round_to(totals.teamwork_sum as f64 / totals.teamwork_rows as f64, 1));
    let final_score = match avg_teamwork {
        Some(teamwork) => round_to((avg_attitude + teamwork) / 2.0, 2),
        None => round_to(avg_attitude, 2),
    };

    CompositeScore {
        subject_id,
        avg_attitude,
        avg_teamwork,
        final_score,
        assessment_count: totals.rows,
    }
}

/// Leaderboard order: final score, then attitude, then row count, all
/// descending, then subject id ascending.
pub fn rank_order(a: &CompositeScore, b: &CompositeScore) -> Ordering {
    b.final_score
        .total_cmp(&a.final_score)
        .then_with(|| b.avg_attitude.total_cmp(&a.avg_attitude))
        .then_with(|| b.assessment_count.cmp(&a.assessment_count))
        .then_with(|| a.subject_id.cmp(&b.subject_id))
}

/// Ranked leaderboard for the roster. Rows naming subjects outside the
/// roster are ignored.
pub fn leaderboard(roster: &[Subject], assessments: &[Assessment]) -> Vec<LeaderboardEntry> {
    let mut scores = composite_scores(assessments);

    let mut entries: Vec<LeaderboardEntry> = roster
        .iter()
        .filter_map(|subject| {
            scores.remove(&subject.id).map(|score| LeaderboardEntry {
                subject: subject.clone(),
                score,
            })
        })
        .collect();

    entries.sort_by(|a, b| rank_order(&a.score, &b.score));
    entries
}

pub fn podium<T>(ranked: &[T], places: usize) -> &[T] {
    &ranked[..ranked.len().min(places)]
}
