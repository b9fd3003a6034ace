use tracing::warn;

use crate::errors::SubmissionError;
use crate::models::{Assessment, Ballot, ScoreInput, Subject, VoteCategory};
use crate::permissions::Capability;

const SCORE_RANGE: std::ops::RangeInclusive<i32> = 0..=100;

fn check_range(field: &'static str, value: i32) -> Result<(), SubmissionError> {
    if SCORE_RANGE.contains(&value) {
        Ok(())
    } else {
        Err(SubmissionError::OutOfRangeScore { field, value })
    }
}

pub fn find_subject<'a>(roster: &'a [Subject], username: &str) -> Result<&'a Subject, SubmissionError> {
    roster
        .iter()
        .find(|subject| subject.username == username)
        .ok_or_else(|| SubmissionError::UnknownSubject(username.to_string()))
}

/// Checks one evaluator's scores for one target and returns the row to store.
///
/// Teamwork scores from evaluators who do not judge teamwork are dropped
/// rather than rejected.
pub fn validate_assessment(
    evaluator: &Subject,
    target: &Subject,
    period: &str,
    scores: ScoreInput,
    existing: &[Assessment],
) -> Result<Assessment, SubmissionError> {
    if evaluator.id == target.id {
        return Err(SubmissionError::SelfTarget);
    }
    if !evaluator.role.can(Capability::JudgeAttitude) {
        return Err(SubmissionError::EvaluatorNotPermitted(evaluator.role));
    }
    if !target.role.is_evaluable() {
        return Err(SubmissionError::IneligibleTarget(target.role));
    }

    check_range("attitude", scores.attitude)?;
    if let Some(teamwork) = scores.teamwork {
        check_range("teamwork", teamwork)?;
    }

    let duplicate = existing.iter().any(|row| {
        row.evaluator_id == evaluator.id && row.target_id == target.id && row.period == period
    });
    if duplicate {
        return Err(SubmissionError::duplicate_assessment(period));
    }

    let teamwork_score = match scores.teamwork {
        Some(value) if !evaluator.role.can(Capability::JudgeTeamwork) => {
            warn!(
                evaluator = %evaluator.username,
                role = %evaluator.role,
                value,
                "dropping teamwork score from evaluator without teamwork capability"
            );
            None
        }
        other => other,
    };

    Ok(Assessment {
        evaluator_id: evaluator.id,
        target_id: target.id,
        period: period.to_string(),
        attitude_score: scores.attitude,
        teamwork_score,
        feedback: scores.feedback.filter(|text| !text.trim().is_empty()),
        submitted_at: None,
    })
}

pub fn validate_ballot(
    voter: &Subject,
    candidate: &Subject,
    period: &str,
    category: VoteCategory,
    existing: &[Ballot],
) -> Result<Ballot, SubmissionError> {
    if voter.id == candidate.id {
        return Err(SubmissionError::SelfTarget);
    }
    if !category.accepts(candidate.role) {
        return Err(SubmissionError::IneligibleCandidate {
            category,
            role: candidate.role,
        });
    }

    let duplicate = existing
        .iter()
        .any(|row| row.voter_id == voter.id && row.category == category && row.period == period);
    if duplicate {
        return Err(SubmissionError::duplicate_ballot(period));
    }

    Ok(Ballot {
        voter_id: voter.id,
        candidate_id: candidate.id,
        period: period.to_string(),
        category,
    })
}

/// Validates the two-category ballot a voter submits in one go. Either both
/// ballots are accepted or neither is.
pub fn validate_ballot_pair(
    voter: &Subject,
    peer_pick: &Subject,
    leader_pick: &Subject,
    period: &str,
    existing: &[Ballot],
) -> Result<[Ballot; 2], SubmissionError> {
    let peer = validate_ballot(voter, peer_pick, period, VoteCategory::MostFunPeer, existing)?;
    let leader = validate_ballot(
        voter,
        leader_pick,
        period,
        VoteCategory::FavoriteLeader,
        existing,
    )?;
    Ok([peer, leader])
}

/// Subjects the evaluator can still score this period, by display name.
pub fn pending_targets<'a>(
    evaluator: &Subject,
    roster: &'a [Subject],
    assessments: &[Assessment],
    period: &str,
) -> Vec<&'a Subject> {
    let mut pending: Vec<&Subject> = roster
        .iter()
        .filter(|subject| subject.id != evaluator.id && subject.role.is_evaluable())
        .filter(|subject| {
            !assessments.iter().any(|row| {
                row.evaluator_id == evaluator.id
                    && row.target_id == subject.id
                    && row.period == period
            })
        })
        .collect();
    pending.sort_by(|a, b| a.display_name.cmp(&b.display_name).then(a.id.cmp(&b.id)));
    pending
}

/// Eligible candidates for a category, excluding the voter, by username.
pub fn candidate_pool<'a>(
    voter: &Subject,
    roster: &'a [Subject],
    category: VoteCategory,
) -> Vec<&'a Subject> {
    let mut pool: Vec<&Subject> = roster
        .iter()
        .filter(|subject| subject.id != voter.id && category.accepts(subject.role))
        .collect();
    pool.sort_by(|a, b| a.username.cmp(&b.username));
    pool
}

pub fn has_voted(voter: &Subject, ballots: &[Ballot], period: &str) -> bool {
    ballots
        .iter()
        .any(|row| row.voter_id == voter.id && row.period == period)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use uuid::Uuid;

    fn subject(username: &str, role: Role) -> Subject {
        Subject {
            id: Uuid::new_v4(),
            username: username.to_string(),
            display_name: username.to_string(),
            role,
            department: "Outreach".to_string(),
            cohort: "2026".to_string(),
        }
    }

    fn scores(attitude: i32, teamwork: Option<i32>) -> ScoreInput {
        ScoreInput {
            attitude,
            teamwork,
            feedback: None,
        }
    }

    #[test]
    fn accepts_first_assessment_and_rejects_repeat() {
        let evaluator = subject("rina", Role::Board);
        let target = subject("dimas", Role::Member);
        let other = subject("sari", Role::Member);

        let first = validate_assessment(&evaluator, &target, "Q1", scores(80, None), &[])
            .expect("first submission is accepted");
        let existing = vec![first];

        let repeat = validate_assessment(&evaluator, &target, "Q1", scores(70, None), &existing);
        assert_eq!(repeat, Err(SubmissionError::duplicate_assessment("Q1")));

        assert!(validate_assessment(&evaluator, &other, "Q1", scores(70, None), &existing).is_ok());
        assert!(validate_assessment(&evaluator, &target, "Q2", scores(70, None), &existing).is_ok());
    }

    #[test]
    fn rejects_self_assessment() {
        let evaluator = subject("rina", Role::Board);
        let result = validate_assessment(&evaluator, &evaluator, "Q1", scores(90, None), &[]);
        assert_eq!(result, Err(SubmissionError::SelfTarget));
    }

    #[test]
    fn rejects_admin_targets() {
        let evaluator = subject("rina", Role::Board);
        let admin = subject("root", Role::Admin);
        let result = validate_assessment(&evaluator, &admin, "Q1", scores(90, None), &[]);
        assert_eq!(result, Err(SubmissionError::IneligibleTarget(Role::Admin)));
    }

    #[test]
    fn rejects_evaluators_without_attitude_capability() {
        let member = subject("sari", Role::Member);
        let target = subject("dimas", Role::Member);
        let result = validate_assessment(&member, &target, "Q1", scores(90, None), &[]);
        assert_eq!(
            result,
            Err(SubmissionError::EvaluatorNotPermitted(Role::Member))
        );
    }

    #[test]
    fn rejects_out_of_range_scores() {
        let evaluator = subject("bayu", Role::DepartmentHead);
        let target = subject("dimas", Role::Member);

        let high = validate_assessment(&evaluator, &target, "Q1", scores(101, None), &[]);
        assert_eq!(
            high,
            Err(SubmissionError::OutOfRangeScore {
                field: "attitude",
                value: 101
            })
        );

        let negative = validate_assessment(&evaluator, &target, "Q1", scores(50, Some(-1)), &[]);
        assert_eq!(
            negative,
            Err(SubmissionError::OutOfRangeScore {
                field: "teamwork",
                value: -1
            })
        );

        assert!(validate_assessment(&evaluator, &target, "Q1", scores(0, Some(100)), &[]).is_ok());
    }

    #[test]
    fn keeps_teamwork_only_from_teamwork_judges() {
        let head = subject("bayu", Role::DepartmentHead);
        let board = subject("rina", Role::Board);
        let target = subject("dimas", Role::Member);

        let from_head = validate_assessment(&head, &target, "Q1", scores(80, Some(60)), &[])
            .expect("accepted");
        assert_eq!(from_head.teamwork_score, Some(60));

        let from_board = validate_assessment(&board, &target, "Q1", scores(80, Some(60)), &[])
            .expect("accepted");
        assert_eq!(from_board.teamwork_score, None);
    }

    #[test]
    fn blank_feedback_is_dropped() {
        let evaluator = subject("rina", Role::Board);
        let target = subject("dimas", Role::Member);
        let input = ScoreInput {
            attitude: 75,
            teamwork: None,
            feedback: Some("   ".to_string()),
        };
        let row = validate_assessment(&evaluator, &target, "Q1", input, &[]).expect("accepted");
        assert_eq!(row.feedback, None);
    }

    #[test]
    fn ballot_rejects_candidate_outside_pool() {
        let voter = subject("sari", Role::Member);
        let leader = subject("rina", Role::Board);
        let peer = subject("dimas", Role::Member);

        let result = validate_ballot(&voter, &leader, "Q1", VoteCategory::MostFunPeer, &[]);
        assert_eq!(
            result,
            Err(SubmissionError::IneligibleCandidate {
                category: VoteCategory::MostFunPeer,
                role: Role::Board
            })
        );

        let result = validate_ballot(&voter, &peer, "Q1", VoteCategory::FavoriteLeader, &[]);
        assert!(matches!(
            result,
            Err(SubmissionError::IneligibleCandidate { .. })
        ));
    }

    #[test]
    fn ballot_is_unique_per_voter_category_and_period() {
        let voter = subject("sari", Role::Member);
        let peer = subject("dimas", Role::Member);
        let other_peer = subject("ayu", Role::Member);
        let leader = subject("rina", Role::Board);

        let first = validate_ballot(&voter, &peer, "Q1", VoteCategory::MostFunPeer, &[])
            .expect("accepted");
        let existing = vec![first];

        assert_eq!(
            validate_ballot(&voter, &other_peer, "Q1", VoteCategory::MostFunPeer, &existing),
            Err(SubmissionError::duplicate_ballot("Q1"))
        );
        assert!(
            validate_ballot(&voter, &leader, "Q1", VoteCategory::FavoriteLeader, &existing).is_ok()
        );
        assert!(
            validate_ballot(&voter, &other_peer, "Q2", VoteCategory::MostFunPeer, &existing)
                .is_ok()
        );
    }

    #[test]
    fn ballot_rejects_self_vote() {
        let voter = subject("dimas", Role::Member);
        let result = validate_ballot(&voter, &voter, "Q1", VoteCategory::MostFunPeer, &[]);
        assert_eq!(result, Err(SubmissionError::SelfTarget));
    }

    #[test]
    fn ballot_pair_is_all_or_nothing() {
        let voter = subject("sari", Role::Member);
        let peer = subject("dimas", Role::Member);
        let leader = subject("rina", Role::Board);

        let [first, second] =
            validate_ballot_pair(&voter, &peer, &leader, "Q1", &[]).expect("accepted");
        assert_eq!(first.category, VoteCategory::MostFunPeer);
        assert_eq!(second.category, VoteCategory::FavoriteLeader);
        assert_eq!(first.period, second.period);

        let swapped = validate_ballot_pair(&voter, &leader, &peer, "Q1", &[]);
        assert!(matches!(
            swapped,
            Err(SubmissionError::IneligibleCandidate { .. })
        ));
    }

    #[test]
    fn pending_targets_skip_self_admins_and_rated() {
        let evaluator = subject("rina", Role::Board);
        let admin = subject("root", Role::Admin);
        let rated = subject("ayu", Role::Member);
        let open = subject("dimas", Role::DepartmentHead);
        let roster = vec![evaluator.clone(), admin, rated.clone(), open.clone()];

        let done = validate_assessment(&evaluator, &rated, "Q1", scores(88, None), &[])
            .expect("accepted");

        let pending = pending_targets(&evaluator, &roster, &[done], "Q1");
        let names: Vec<&str> = pending.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["dimas"]);
    }

    #[test]
    fn candidate_pool_excludes_voter_and_other_roles() {
        let voter = subject("sari", Role::Member);
        let roster = vec![
            voter.clone(),
            subject("dimas", Role::Member),
            subject("ayu", Role::Member),
            subject("rina", Role::Board),
            subject("root", Role::Admin),
        ];

        let peers = candidate_pool(&voter, &roster, VoteCategory::MostFunPeer);
        let names: Vec<&str> = peers.iter().map(|s| s.username.as_str()).collect();
        assert_eq!(names, vec!["ayu", "dimas"]);

        let leaders = candidate_pool(&voter, &roster, VoteCategory::FavoriteLeader);
        assert_eq!(leaders.len(), 1);
        assert_eq!(leaders[0].username, "rina");
    }

    #[test]
    fn find_subject_reports_unknown_usernames() {
        let roster = vec![subject("sari", Role::Member)];
        assert_eq!(find_subject(&roster, "sari").map(|s| s.role), Ok(Role::Member));
        assert_eq!(
            find_subject(&roster, "ghost"),
            Err(SubmissionError::UnknownSubject("ghost".to_string()))
        );
    }

    #[test]
    fn has_voted_is_scoped_to_period() {
        let voter = subject("sari", Role::Member);
        let peer = subject("dimas", Role::Member);
        let ballot = validate_ballot(&voter, &peer, "Q1", VoteCategory::MostFunPeer, &[])
            .expect("accepted");
        assert!(has_voted(&voter, &[ballot.clone()], "Q1"));
        assert!(!has_voted(&voter, &[ballot], "Q2"));
    }
}
