use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitRole {
    Member,
    Owner,
    Admin,
}

impl UnitRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitRole::Member => "member",
            UnitRole::Owner => "owner",
            UnitRole::Admin => "admin",
        }
    }

    /// Owners and unit admins organize the unit's work: they assign referrals
    /// and manage memberships.
    pub fn is_organizer(&self) -> bool {
        matches!(self, UnitRole::Owner | UnitRole::Admin)
    }
}

impl fmt::Display for UnitRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UnitRole {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "member" => Ok(UnitRole::Member),
            "owner" => Ok(UnitRole::Owner),
            "admin" => Ok(UnitRole::Admin),
            other => Err(format!("unknown unit role: {other}")),
        }
    }
}

/// What the caller is with respect to one referral.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReferralAccess {
    pub is_admin: bool,
    pub is_creator: bool,
    /// Role in the unit that owns the referral's topic, if any.
    pub unit_role: Option<UnitRole>,
}

impl ReferralAccess {
    pub fn can_view(&self) -> bool {
        self.is_admin || self.is_creator || self.unit_role.is_some()
    }

    pub fn can_answer(&self) -> bool {
        self.is_admin || self.unit_role.is_some()
    }

    pub fn can_assign(&self) -> bool {
        self.is_admin || self.unit_role.is_some_and(|role| role.is_organizer())
    }

    pub fn can_unassign(&self) -> bool {
        self.can_assign()
    }
}

pub fn can_manage_unit(is_admin: bool, unit_role: Option<UnitRole>) -> bool {
    is_admin || unit_role.is_some_and(|role| role.is_organizer())
}
