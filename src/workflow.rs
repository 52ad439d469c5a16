//! Referral lifecycle.
//!
//! A referral starts as `received`, becomes `assigned` as soon as one unit
//! member is tasked with it, and ends as `answered`. The state is stored as a
//! lowercase string on the `referrals` row; the functions below compute the
//! next state and refuse transitions that make no sense from the current one.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReferralState {
    Received,
    Assigned,
    Answered,
    Closed,
    Incomplete,
}

impl ReferralState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferralState::Received => "received",
            ReferralState::Assigned => "assigned",
            ReferralState::Answered => "answered",
            ReferralState::Closed => "closed",
            ReferralState::Incomplete => "incomplete",
        }
    }
}

impl fmt::Display for ReferralState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReferralState {
    type Err = TransitionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "received" => Ok(ReferralState::Received),
            "assigned" => Ok(ReferralState::Assigned),
            "answered" => Ok(ReferralState::Answered),
            "closed" => Ok(ReferralState::Closed),
            "incomplete" => Ok(ReferralState::Incomplete),
            other => Err(TransitionError::UnknownState(other.to_string())),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot {action} a referral in state {from}")]
    NotAllowed {
        action: &'static str,
        from: ReferralState,
    },
    #[error("unknown referral state: {0}")]
    UnknownState(String),
}

pub fn assign(current: ReferralState) -> Result<ReferralState, TransitionError> {
    match current {
        ReferralState::Received | ReferralState::Assigned => Ok(ReferralState::Assigned),
        from => Err(TransitionError::NotAllowed {
            action: "assign",
            from,
        }),
    }
}

/// `remaining` is the number of assignees left once the removal is applied.
pub fn unassign(current: ReferralState, remaining: i64) -> Result<ReferralState, TransitionError> {
    match current {
        ReferralState::Assigned if remaining > 0 => Ok(ReferralState::Assigned),
        ReferralState::Assigned => Ok(ReferralState::Received),
        from => Err(TransitionError::NotAllowed {
            action: "unassign",
            from,
        }),
    }
}

pub fn answer(current: ReferralState) -> Result<ReferralState, TransitionError> {
    match current {
        ReferralState::Received | ReferralState::Assigned => Ok(ReferralState::Answered),
        from => Err(TransitionError::NotAllowed {
            action: "answer",
            from,
        }),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityVerb {
    Created,
    Assigned,
    Unassigned,
    Answered,
}

impl ActivityVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityVerb::Created => "created",
            ActivityVerb::Assigned => "assigned",
            ActivityVerb::Unassigned => "unassigned",
            ActivityVerb::Answered => "answered",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_from_received_or_assigned() {
        assert_eq!(
            assign(ReferralState::Received),
            Ok(ReferralState::Assigned)
        );
        assert_eq!(
            assign(ReferralState::Assigned),
            Ok(ReferralState::Assigned)
        );
    }

    #[test]
    fn assign_refused_once_answered() {
        let err = assign(ReferralState::Answered).unwrap_err();
        assert_eq!(err.to_string(), "cannot assign a referral in state answered");
    }

    #[test]
    fn unassign_last_assignee_goes_back_to_received() {
        assert_eq!(
            unassign(ReferralState::Assigned, 0),
            Ok(ReferralState::Received)
        );
    }

    #[test]
    fn unassign_keeps_assigned_while_others_remain() {
        assert_eq!(
            unassign(ReferralState::Assigned, 2),
            Ok(ReferralState::Assigned)
        );
    }

    #[test]
    fn unassign_requires_assigned_state() {
        assert!(unassign(ReferralState::Received, 0).is_err());
        assert!(unassign(ReferralState::Answered, 1).is_err());
    }

    #[test]
    fn answer_only_once() {
        assert_eq!(
            answer(ReferralState::Received),
            Ok(ReferralState::Answered)
        );
        assert_eq!(
            answer(ReferralState::Assigned),
            Ok(ReferralState::Answered)
        );
        assert!(answer(ReferralState::Answered).is_err());
        assert!(answer(ReferralState::Closed).is_err());
    }

    #[test]
    fn parses_stored_states() {
        for state in [
            ReferralState::Received,
            ReferralState::Assigned,
            ReferralState::Answered,
            ReferralState::Closed,
            ReferralState::Incomplete,
        ] {
            assert_eq!(state.as_str().parse::<ReferralState>(), Ok(state));
        }
        assert_eq!(
            "draft".parse::<ReferralState>(),
            Err(TransitionError::UnknownState("draft".into()))
        );
    }
}
