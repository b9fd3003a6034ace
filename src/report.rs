use std::collections::HashMap;
use std::fmt::Write;

use serde::Serialize;

use crate::models::{LeaderboardEntry, PeriodStatus, TallyResult, VoteCategory};
use crate::scoring::{self, podium};
use crate::visibility::Gated;

const PODIUM_PLACES: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DepartmentSummary {
    pub department: String,
    pub ranked: usize,
    pub avg_final_score: f64,
}

pub fn summarize_by_department(entries: &[LeaderboardEntry]) -> Vec<DepartmentSummary> {
    let mut map: HashMap<String, (usize, f64)> = HashMap::new();

    for entry in entries {
        let slot = map.entry(entry.subject.department.clone()).or_insert((0, 0.0));
        slot.0 += 1;
        slot.1 += entry.score.final_score;
    }

    let mut summaries: Vec<DepartmentSummary> = map
        .into_iter()
        .map(|(department, (ranked, total))| DepartmentSummary {
            department,
            ranked,
            avg_final_score: scoring::round_to(total / ranked as f64, 2),
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.avg_final_score
            .total_cmp(&a.avg_final_score)
            .then_with(|| a.department.cmp(&b.department))
    });
    summaries
}

pub fn format_teamwork(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |avg| format!("{avg:.1}"))
}

pub fn build_report(
    period: &str,
    status: &PeriodStatus,
    leaderboard: &Gated<Vec<LeaderboardEntry>>,
    tallies: &[(VoteCategory, Gated<Vec<TallyResult>>)],
) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Cohort Recognition Report");
    match (status.published, status.published_at) {
        (true, Some(at)) => {
            let _ = writeln!(output, "Period {} (published {})", period, at.format("%Y-%m-%d"));
        }
        (true, None) => {
            let _ = writeln!(output, "Period {} (published)", period);
        }
        (false, _) => {
            let _ = writeln!(output, "Period {} (not yet published)", period);
        }
    }
    let _ = writeln!(output);

    let _ = writeln!(output, "## Performance Podium");
    match leaderboard {
        Gated::Denied => {
            let _ = writeln!(output, "Results are locked until the period is published.");
        }
        Gated::Visible(entries) if entries.is_empty() => {
            let _ = writeln!(output, "No assessments recorded for this period.");
        }
        Gated::Visible(entries) => {
            for (place, entry) in podium(entries, PODIUM_PLACES).iter().enumerate() {
                let _ = writeln!(
                    output,
                    "{}. {} ({}, {}) final {:.2}",
                    place + 1,
                    entry.subject.display_name,
                    entry.subject.role,
                    entry.subject.department,
                    entry.score.final_score
                );
            }

            let _ = writeln!(output);
            let _ = writeln!(output, "## Full Leaderboard");
            let _ = writeln!(output, "| Rank | Name | Attitude | Teamwork | Final | Ratings |");
            let _ = writeln!(output, "|---|---|---|---|---|---|");
            for (rank, entry) in entries.iter().enumerate() {
                let _ = writeln!(
                    output,
                    "| {} | {} | {:.1} | {} | {:.2} | {} |",
                    rank + 1,
                    entry.subject.display_name,
                    entry.score.avg_attitude,
                    format_teamwork(entry.score.avg_teamwork),
                    entry.score.final_score,
                    entry.score.assessment_count
                );
            }

            let _ = writeln!(output);
            let _ = writeln!(output, "## Departments");
            for summary in summarize_by_department(entries) {
                let _ = writeln!(
                    output,
                    "- {}: {} ranked (avg final {:.2})",
                    summary.department, summary.ranked, summary.avg_final_score
                );
            }
        }
    }

    for (category, tally) in tallies {
        let _ = writeln!(output);
        let _ = writeln!(output, "## {}", category.title());
        match tally {
            Gated::Denied => {
                let _ = writeln!(output, "Votes are sealed until the period is published.");
            }
            Gated::Visible(results) if results.is_empty() => {
                let _ = writeln!(output, "No ballots cast in this category.");
            }
            Gated::Visible(results) => {
                for result in results {
                    let _ = writeln!(
                        output,
                        "- {} ({}): {} votes",
                        result.candidate.display_name, result.candidate.role, result.votes
                    );
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CompositeScore, Role, Subject};
    use chrono::TimeZone;
    use uuid::Uuid;

    fn entry(name: &str, department: &str, final_score: f64, teamwork: Option<f64>) -> LeaderboardEntry {
        let id = Uuid::new_v4();
        LeaderboardEntry {
            subject: Subject {
                id,
                username: name.to_lowercase(),
                display_name: name.to_string(),
                role: Role::Member,
                department: department.to_string(),
                cohort: "2026".to_string(),
            },
            score: CompositeScore {
                subject_id: id,
                avg_attitude: final_score,
                avg_teamwork: teamwork,
                final_score,
                assessment_count: 2,
            },
        }
    }

    #[test]
    fn department_summary_averages_final_scores() {
        let entries = vec![
            entry("Ayu", "Events", 90.0, None),
            entry("Bima", "Outreach", 70.0, None),
            entry("Citra", "Events", 80.0, None),
        ];
        let summaries = summarize_by_department(&entries);
        assert_eq!(summaries[0].department, "Events");
        assert_eq!(summaries[0].ranked, 2);
        assert_eq!(summaries[0].avg_final_score, 85.0);
        assert_eq!(summaries[1].department, "Outreach");
    }

    #[test]
    fn teamwork_renders_dash_when_not_applicable() {
        assert_eq!(format_teamwork(None), "-");
        assert_eq!(format_teamwork(Some(0.0)), "0.0");
        assert_eq!(format_teamwork(Some(72.26)), "72.3");
    }

    #[test]
    fn header_reflects_publication_state() {
        let empty = Gated::Visible(Vec::new());
        let undated = build_report("Q1", &PeriodStatus::from_columns(true, None), &empty, &[]);
        assert!(undated.contains("Period Q1 (published)\n"));

        let at = chrono::Utc.with_ymd_and_hms(2026, 3, 31, 9, 0, 0).unwrap();
        let dated = build_report("Q1", &PeriodStatus::from_columns(true, Some(at)), &empty, &[]);
        assert!(dated.contains("Period Q1 (published 2026-03-31)"));
    }

    #[test]
    fn locked_report_shows_no_scores() {
        let report = build_report(
            "Q1",
            &PeriodStatus::default(),
            &Gated::Denied,
            &[(VoteCategory::MostFunPeer, Gated::Denied)],
        );
        assert!(report.contains("not yet published"));
        assert!(report.contains("Results are locked"));
        assert!(report.contains("Votes are sealed"));
        assert!(!report.contains("Full Leaderboard"));
    }

    #[test]
    fn visible_report_lists_podium_and_tallies() {
        let entries = vec![
            entry("Ayu", "Events", 90.0, Some(88.0)),
            entry("Bima", "Outreach", 70.0, None),
        ];
        let tally = vec![TallyResult {
            candidate: entries[1].subject.clone(),
            votes: 3,
        }];
        let report = build_report(
            "Q1",
            &PeriodStatus::default(),
            &Gated::Visible(entries),
            &[
                (VoteCategory::MostFunPeer, Gated::Visible(tally)),
                (VoteCategory::FavoriteLeader, Gated::Visible(Vec::new())),
            ],
        );
        assert!(report.contains("1. Ayu (member, Events) final 90.00"));
        assert!(report.contains("| 2 | Bima | 70.0 | - | 70.00 | 2 |"));
        assert!(report.contains("- Bima (member): 3 votes"));
        assert!(report.contains("No ballots cast in this category."));
    }
}
