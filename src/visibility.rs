use serde::Serialize;
use tracing::{debug, info};

use crate::directory::Directory;
use crate::models::{LeaderboardEntry, TallyResult, VoteCategory};
use crate::permissions::{capabilities_for, Capability};
use crate::scoring;
use crate::tally;

/// Outcome of a gated read. `Denied` is the normal "results pending" state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "results", rename_all = "snake_case")]
pub enum Gated<T> {
    Visible(T),
    Denied,
}

impl<T> Gated<T> {
    pub fn is_denied(&self) -> bool {
        matches!(self, Gated::Denied)
    }

    pub fn visible(self) -> Option<T> {
        match self {
            Gated::Visible(value) => Some(value),
            Gated::Denied => None,
        }
    }
}

pub fn can_view_results(viewer_role: &str, published: bool) -> bool {
    published || capabilities_for(viewer_role).contains(Capability::ViewResultsEarly)
}

async fn check_access<D: Directory + ?Sized>(
    directory: &D,
    period: &str,
    viewer_role: &str,
) -> anyhow::Result<bool> {
    let published = directory.period_published(period).await?;
    let allowed = can_view_results(viewer_role, published);
    if !allowed {
        debug!(period, viewer_role, "results withheld until publication");
    }
    Ok(allowed)
}

pub async fn get_leaderboard<D: Directory + ?Sized>(
    directory: &D,
    period: &str,
    viewer_role: &str,
) -> anyhow::Result<Gated<Vec<LeaderboardEntry>>> {
    if !check_access(directory, period, viewer_role).await? {
        return Ok(Gated::Denied);
    }

    let subjects = directory.list_subjects().await?;
    let assessments = directory.list_assessments(period).await?;
    let entries = scoring::leaderboard(&subjects, &assessments);
    info!(
        period,
        rows = assessments.len(),
        ranked = entries.len(),
        "leaderboard computed"
    );
    Ok(Gated::Visible(entries))
}

pub async fn get_vote_tally<D: Directory + ?Sized>(
    directory: &D,
    period: &str,
    category: VoteCategory,
    viewer_role: &str,
) -> anyhow::Result<Gated<Vec<TallyResult>>> {
    if !check_access(directory, period, viewer_role).await? {
        return Ok(Gated::Denied);
    }

    let subjects = directory.list_subjects().await?;
    let ballots = directory.list_ballots(period).await?;
    let results = tally::tally_votes(&subjects, &ballots, category);
    info!(
        period,
        %category,
        ballots = ballots.len(),
        candidates = results.len(),
        "vote tally computed"
    );
    Ok(Gated::Visible(results))
}
