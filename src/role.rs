use std::fmt;

use serde::{Deserialize, Serialize};

/// Every role a stored user can hold. Adding a variant forces every
/// gate and panel fence to be revisited, which is the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Admin,
    Superadmin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Admin => "admin",
            Role::Superadmin => "superadmin",
        }
    }
}

impl TryFrom<&'_ str> for Role {
    type Error = ();

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "student" => Ok(Role::Student),
            "admin" => Ok(Role::Admin),
            "superadmin" => Ok(Role::Superadmin),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}", self.as_str())
    }
}

/// The roles a route admits. Membership is explicit: a set that means to
/// admit superadmins must list `Role::Superadmin`, holding a stronger
/// role grants nothing by itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoleSet(&'static [Role]);

impl RoleSet {
    pub const fn new(roles: &'static [Role]) -> Self {
        Self(roles)
    }

    pub fn contains(self, role: Role) -> bool {
        self.0.contains(&role)
    }
}

pub fn can_access(required: RoleSet, current: Option<Role>) -> bool {
    match current {
        Some(role) => required.contains(role),
        None => false,
    }
}
