//! Roles and permission evaluation.
//!
//! Roles form a strict total order: `Member < Manager < Admin`. Every
//! authorization decision in the crate reduces to comparing ordinals, so the
//! functions here are pure and never fail: an absent principal simply
//! evaluates to `false`.
//!
//! # Example
//!
//! ```
//! use tollgate::permission::{can_manage_user, has_required_role};
//! use tollgate::{Principal, Role};
//!
//! let manager = Principal::new("u-7", Role::Manager);
//!
//! assert!(has_required_role(Some(&manager), Role::Member));
//! assert!(!has_required_role(Some(&manager), Role::Admin));
//! assert!(can_manage_user(Some(&manager), Role::Manager));
//! assert!(!can_manage_user(Some(&manager), Role::Admin));
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::principal::Principal;

/// Account role.
///
/// Declaration order matches privilege order, so the derived `Ord` agrees
/// with [`Role::ordinal`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Member,
    Manager,
    Admin,
}

impl Role {
    /// All roles, lowest privilege first.
    pub const ALL: [Role; 3] = [Role::Member, Role::Manager, Role::Admin];

    /// Ordinal value for runtime comparison.
    /// Higher ordinal = more privileged.
    pub const fn ordinal(self) -> u8 {
        match self {
            Role::Member => 1,
            Role::Manager => 2,
            Role::Admin => 3,
        }
    }

    /// Whether this role meets or exceeds `required`.
    pub const fn at_least(self, required: Role) -> bool {
        self.ordinal() >= required.ordinal()
    }

    /// Wire name of the role.
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::Member => "member",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }

    /// Parse a wire name. Anything outside the enumeration is `None`.
    pub fn parse(s: &str) -> Option<Role> {
        match s {
            "member" => Some(Role::Member),
            "manager" => Some(Role::Manager),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Role::parse(s).ok_or_else(|| Error::BadRequest(format!("Unknown role: {s}")))
    }
}

/// Whether `principal` holds at least `required`.
///
/// An absent principal never satisfies any role.
pub fn has_required_role(principal: Option<&Principal>, required: Role) -> bool {
    match principal {
        Some(p) => p.role.at_least(required),
        None => false,
    }
}

/// Whether `acting` may administer an account holding `target`.
///
/// Only managers and admins manage accounts at all. Admins manage every
/// role; managers manage members and other managers but never admins.
pub fn can_manage_user(acting: Option<&Principal>, target: Role) -> bool {
    let Some(acting) = acting else {
        return false;
    };
    if !has_required_role(Some(acting), Role::Manager) {
        return false;
    }
    match acting.role {
        Role::Admin => true,
        Role::Manager => target.ordinal() <= Role::Manager.ordinal(),
        Role::Member => false,
    }
}

/// Require `principal` to hold at least `required`.
///
/// # Returns
/// - `Ok(principal)` if the role is sufficient
/// - `Err(Error::Unauthorized)` if there is no principal
/// - `Err(Error::Forbidden)` if the role is too low
pub fn require_role(principal: Option<Principal>, required: Role) -> Result<Principal> {
    let principal = principal.ok_or(Error::Unauthorized)?;
    if !has_required_role(Some(&principal), required) {
        return Err(Error::Forbidden { required });
    }
    Ok(principal)
}

/// Require `acting` to have standing over an account holding `target`.
pub fn require_manage(acting: &Principal, target: Role) -> Result<()> {
    if can_manage_user(Some(acting), target) {
        Ok(())
    } else {
        Err(Error::EscalationDenied { target })
    }
}
