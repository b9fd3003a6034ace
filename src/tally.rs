use std::collections::HashMap;

use uuid::Uuid;

use crate::models::{Ballot, Subject, TallyResult, VoteCategory};

/// Counts one category's ballots per candidate, most votes first.
///
/// Ballots naming a candidate outside the category's pool, or outside the
/// roster, do not count.
pub fn tally_votes(
    roster: &[Subject],
    ballots: &[Ballot],
    category: VoteCategory,
) -> Vec<TallyResult> {
    let pool: HashMap<Uuid, &Subject> = roster
        .iter()
        .filter(|subject| category.accepts(subject.role))
        .map(|subject| (subject.id, subject))
        .collect();

    let mut counts: HashMap<Uuid, usize> = HashMap::new();
    for ballot in ballots.iter().filter(|ballot| ballot.category == category) {
        if pool.contains_key(&ballot.candidate_id) {
            *counts.entry(ballot.candidate_id).or_insert(0) += 1;
        }
    }

    let mut results: Vec<TallyResult> = counts
        .into_iter()
        .filter_map(|(candidate_id, votes)| {
            pool.get(&candidate_id).map(|candidate| TallyResult {
                candidate: (*candidate).clone(),
                votes,
            })
        })
        .collect();

    results.sort_by(|a, b| {
        b.votes
            .cmp(&a.votes)
            .then_with(|| a.candidate.id.cmp(&b.candidate.id))
    });
    results
}
