use serde::Deserialize;

use super::types::{RoleRecord, RoleRights, RoleSchedule};
use crate::errors::AppError;

pub const MAX_NAME_LEN: usize = 100;

/// Role attributes submitted by the editor.
///
/// Every attribute the editor may change is a named field; anything else in
/// the request body is rejected by serde.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleForm {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub category_id: i64,
    #[serde(default)]
    pub max_members: i32,
    #[serde(default)]
    pub default_registration: bool,
    #[serde(default)]
    pub schedule: RoleSchedule,
    #[serde(default)]
    pub rights: RoleRights,
    /// Desired child roles. Absent means the role has no dependencies.
    #[serde(default)]
    pub dependent_roles: Option<Vec<i64>>,
}

impl RoleForm {
    /// Field-level checks that need no database access.
    pub fn validate(&self) -> Result<RoleRecord, AppError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(AppError::Validation("Name must not be empty".to_string()));
        }
        if name.chars().count() > MAX_NAME_LEN {
            return Err(AppError::Validation(format!(
                "Name must be at most {MAX_NAME_LEN} characters"
            )));
        }
        if self.category_id <= 0 {
            return Err(AppError::Validation("Category must be selected".to_string()));
        }
        if self.max_members < 0 {
            return Err(AppError::Validation("Maximum members must not be negative".to_string()));
        }
        if let (Some(start), Some(end)) = (self.schedule.start_date, self.schedule.end_date) {
            if end < start {
                return Err(AppError::Validation("End date must not be before start date".to_string()));
            }
        }

        let mut schedule = self.schedule.clone();
        schedule.location = schedule.location.trim().to_string();

        Ok(RoleRecord {
            name: name.to_string(),
            description: self.description.trim().to_string(),
            category_id: self.category_id,
            max_members: self.max_members,
            default_registration: self.default_registration,
            schedule,
            rights: self.rights,
        })
    }
}
