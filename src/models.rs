use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Organizational role. Stored as its snake_case label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Board,
    Advisory,
    DepartmentHead,
    Member,
}

impl Role {
    pub const ALL: [Role; 5] = [
        Role::Admin,
        Role::Board,
        Role::Advisory,
        Role::DepartmentHead,
        Role::Member,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Board => "board",
            Role::Advisory => "advisory",
            Role::DepartmentHead => "department_head",
            Role::Member => "member",
        }
    }

    /// Admins run the system and are never scored.
    pub fn is_evaluable(&self) -> bool {
        !matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s.trim())
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// Popularity vote category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VoteCategory {
    MostFunPeer,
    FavoriteLeader,
}

impl VoteCategory {
    pub const ALL: [VoteCategory; 2] = [VoteCategory::MostFunPeer, VoteCategory::FavoriteLeader];

    pub fn as_str(&self) -> &'static str {
        match self {
            VoteCategory::MostFunPeer => "most-fun-peer",
            VoteCategory::FavoriteLeader => "favorite-leader",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            VoteCategory::MostFunPeer => "Most Fun Peer",
            VoteCategory::FavoriteLeader => "Favorite Leader",
        }
    }

    /// Roles a ballot in this category may name.
    pub fn eligible_roles(&self) -> &'static [Role] {
        match self {
            VoteCategory::MostFunPeer => &[Role::Member],
            VoteCategory::FavoriteLeader => &[Role::Board, Role::Advisory, Role::DepartmentHead],
        }
    }

    pub fn accepts(&self, role: Role) -> bool {
        self.eligible_roles().contains(&role)
    }
}

impl fmt::Display for VoteCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VoteCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VoteCategory::ALL
            .into_iter()
            .find(|category| category.as_str() == s.trim())
            .ok_or_else(|| format!("unknown vote category: {s}"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub id: Uuid,
    pub username: String,
    pub display_name: String,
    pub role: Role,
    pub department: String,
    pub cohort: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assessment {
    pub evaluator_id: Uuid,
    pub target_id: Uuid,
    pub period: String,
    pub attitude_score: i32,
    pub teamwork_score: Option<i32>,
    pub feedback: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
}

/// Raw scores as entered by an evaluator, before validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreInput {
    pub attitude: i32,
    pub teamwork: Option<i32>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ballot {
    pub voter_id: Uuid,
    pub candidate_id: Uuid,
    pub period: String,
    pub category: VoteCategory,
}

/// Publication state of a period. Periods nobody published are unpublished.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PeriodStatus {
    pub published: bool,
    /// Only set while published, and only when the store recorded a time.
    pub published_at: Option<DateTime<Utc>>,
}

impl PeriodStatus {
    pub fn from_columns(published: bool, published_at: Option<DateTime<Utc>>) -> Self {
        Self {
            published,
            published_at: published_at.filter(|_| published),
        }
    }
}

/// Derived per-subject score for one period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompositeScore {
    pub subject_id: Uuid,
    pub avg_attitude: f64,
    /// `None` when nobody scored teamwork for this subject.
    pub avg_teamwork: Option<f64>,
    pub final_score: f64,
    pub assessment_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    pub subject: Subject,
    pub score: CompositeScore,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyResult {
    pub candidate: Subject,
    pub votes: usize,
}
