use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Account role, ordered by privilege.
///
/// `Student < Instructor < Admin < SuperAdmin`. A role satisfies any
/// requirement at or below its own level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    Instructor,
    Admin,
    SuperAdmin,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl Role {
    pub const ALL: [Role; 4] = [Role::Student, Role::Instructor, Role::Admin, Role::SuperAdmin];

    /// Ordinal in the hierarchy, `0..=3`.
    pub fn level(self) -> u8 {
        match self {
            Role::Student => 0,
            Role::Instructor => 1,
            Role::Admin => 2,
            Role::SuperAdmin => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Instructor => "instructor",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
        }
    }

    pub fn satisfies(self, required: Role) -> bool {
        self >= required
    }
}

/// Hierarchy level of a possibly missing role; missing counts as the lowest.
pub fn level_of(role: Option<Role>) -> u8 {
    role.map_or(Role::Student.level(), Role::level)
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}
