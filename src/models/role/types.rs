use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

/// Internal name of the category that holds event-participation roles.
pub const EVENTS_CATEGORY: &str = "EVENTS";

/// Module rights granted to members of a role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleRights {
    pub assign_roles: bool,
    pub approve_users: bool,
    pub announcements: bool,
    pub dates: bool,
    pub photo: bool,
    pub documents_files: bool,
    pub guestbook: bool,
    pub guestbook_comments: bool,
    pub edit_user: bool,
    pub weblinks: bool,
    pub all_lists_view: bool,
    pub mail_to_all: bool,
    pub profile: bool,
}

/// Meeting schedule of a role. All parts are optional.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSchedule {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub weekday: Option<Weekday>,
    pub location: String,
}

/// A role as read from the store, with the facts of its category resolved.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Role {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category_id: i64,
    /// Organization owning the category; `None` for global categories.
    pub organization_id: Option<i64>,
    pub is_event_role: bool,
    /// 0 means unlimited.
    pub max_members: i32,
    pub valid: bool,
    pub administrator: bool,
    pub default_registration: bool,
    pub schedule: RoleSchedule,
    pub rights: RoleRights,
}

impl Role {
    /// Global roles are visible to every organization.
    pub fn visible_to(&self, organization_id: i64) -> bool {
        self.organization_id.is_none_or(|org| org == organization_id)
    }

    /// Administrator and event roles never carry dependencies.
    pub fn accepts_dependencies(&self) -> bool {
        !self.administrator && !self.is_event_role
    }
}

/// Attribute values written by an insert or update.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleRecord {
    pub name: String,
    pub description: String,
    pub category_id: i64,
    pub max_members: i32,
    pub default_registration: bool,
    pub schedule: RoleSchedule,
    pub rights: RoleRights,
}

impl RoleRecord {
    /// A plain role with no schedule, no rights and unlimited capacity.
    pub fn new(name: &str, category_id: i64) -> Self {
        RoleRecord {
            name: name.to_string(),
            description: String::new(),
            category_id,
            max_members: 0,
            default_registration: false,
            schedule: RoleSchedule::default(),
            rights: RoleRights::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub organization_id: Option<i64>,
    pub name: String,
    pub name_intern: String,
}

impl Category {
    pub fn is_events(&self) -> bool {
        self.name_intern == EVENTS_CATEGORY
    }

    pub fn visible_to(&self, organization_id: i64) -> bool {
        self.organization_id.is_none_or(|org| org == organization_id)
    }
}

/// Which roles the overview lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleType {
    Inactive,
    #[default]
    Active,
    #[serde(rename = "events")]
    EventParticipation,
}

/// One row of the role overview with its occupant counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoleSummary {
    pub id: i64,
    pub name: String,
    pub category_name: String,
    pub max_members: i32,
    pub num_members: i64,
    pub num_leaders: i64,
    pub num_former: i64,
}

/// Weekdays are stored as 1 (Monday) through 7 (Sunday).
pub fn weekday_to_db(weekday: Option<Weekday>) -> Option<i16> {
    weekday.map(|w| w.number_from_monday() as i16)
}

pub fn weekday_from_db(value: Option<i16>) -> Option<Weekday> {
    let n = value?;
    if !(1..=7).contains(&n) {
        return None;
    }
    Weekday::try_from((n - 1) as u8).ok()
}
