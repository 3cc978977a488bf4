//! The authenticated actor for a single request.

use serde::{Deserialize, Serialize};

use crate::permission::Role;

/// Who is acting on this request.
///
/// Built by [`SessionResolver`](crate::session::SessionResolver) at request
/// start and dropped when the request ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub id: String,
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
}

impl Principal {
    pub fn new(id: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            role,
            department: None,
        }
    }

    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Synthetic admin used outside production when no session exists.
    pub fn fallback(config: &crate::config::Fallback) -> Self {
        Self {
            id: config.user_id.clone(),
            role: Role::Admin,
            department: config.department.clone(),
        }
    }
}
