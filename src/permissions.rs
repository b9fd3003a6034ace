use tracing::debug;

use crate::models::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ViewResultsEarly,
    JudgeAttitude,
    JudgeTeamwork,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CapabilitySet {
    view_results_early: bool,
    judge_attitude: bool,
    judge_teamwork: bool,
}

impl CapabilitySet {
    pub const EMPTY: CapabilitySet = CapabilitySet {
        view_results_early: false,
        judge_attitude: false,
        judge_teamwork: false,
    };

    pub fn contains(&self, capability: Capability) -> bool {
        match capability {
            Capability::ViewResultsEarly => self.view_results_early,
            Capability::JudgeAttitude => self.judge_attitude,
            Capability::JudgeTeamwork => self.judge_teamwork,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::EMPTY
    }
}

impl Role {
    pub fn capabilities(&self) -> CapabilitySet {
        match self {
            Role::Admin => CapabilitySet {
                view_results_early: true,
                ..CapabilitySet::EMPTY
            },
            Role::Board | Role::Advisory => CapabilitySet {
                view_results_early: true,
                judge_attitude: true,
                ..CapabilitySet::EMPTY
            },
            Role::DepartmentHead => CapabilitySet {
                judge_attitude: true,
                judge_teamwork: true,
                ..CapabilitySet::EMPTY
            },
            Role::Member => CapabilitySet::EMPTY,
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.capabilities().contains(capability)
    }
}

/// Resolves a raw role label. Labels that name no known role hold nothing.
pub fn capabilities_for(label: &str) -> CapabilitySet {
    match label.parse::<Role>() {
        Ok(role) => role.capabilities(),
        Err(_) => {
            debug!(label, "unrecognized role label, no capabilities granted");
            CapabilitySet::EMPTY
        }
    }
}
