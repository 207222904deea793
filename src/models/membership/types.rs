use chrono::NaiveDate;
use serde::Serialize;

/// End date stored for memberships that have no planned end (9999-12-31).
pub fn open_end() -> NaiveDate {
    NaiveDate::from_ymd_opt(9999, 12, 31).unwrap_or(NaiveDate::MAX)
}

/// Participation state of a membership row.
///
/// Ordinary roles store NULL (`Approved`). The numbered states come from
/// event participation, where `Refused` rows stay in the table but never
/// count as occupants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalState {
    #[default]
    Approved,
    Invited,
    Tentative,
    Attending,
    Refused,
}

impl ApprovalState {
    pub fn from_db(value: Option<i16>) -> Self {
        match value {
            None => ApprovalState::Approved,
            Some(0) => ApprovalState::Invited,
            Some(1) => ApprovalState::Tentative,
            Some(2) => ApprovalState::Attending,
            Some(_) => ApprovalState::Refused,
        }
    }

    pub fn to_db(self) -> Option<i16> {
        match self {
            ApprovalState::Approved => None,
            ApprovalState::Invited => Some(0),
            ApprovalState::Tentative => Some(1),
            ApprovalState::Attending => Some(2),
            ApprovalState::Refused => Some(3),
        }
    }

    pub fn counts_as_occupant(self) -> bool {
        self != ApprovalState::Refused
    }
}

/// A time-bounded association of a user with a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Membership {
    pub id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub leader: bool,
    pub approval: ApprovalState,
}

impl Membership {
    /// Half-open validity check: `begin <= day < end`.
    pub fn is_active_on(&self, day: NaiveDate) -> bool {
        self.begin <= day && day < self.end
    }
}

/// Data for inserting a membership row.
#[derive(Debug, Clone)]
pub struct NewMembership {
    pub user_id: i64,
    pub role_id: i64,
    pub begin: NaiveDate,
    pub end: NaiveDate,
    pub leader: bool,
    pub approval: ApprovalState,
}

impl NewMembership {
    /// An open-ended, approved, non-leader membership starting on `begin`.
    pub fn starting(role_id: i64, user_id: i64, begin: NaiveDate) -> Self {
        NewMembership {
            user_id,
            role_id,
            begin,
            end: open_end(),
            leader: false,
            approval: ApprovalState::Approved,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_membership_end_date_is_exclusive() {
        let m = Membership {
            id: 1,
            user_id: 7,
            role_id: 3,
            begin: day(2024, 1, 1),
            end: day(2024, 6, 1),
            leader: false,
            approval: ApprovalState::Approved,
        };
        assert!(!m.is_active_on(day(2023, 12, 31)));
        assert!(m.is_active_on(day(2024, 1, 1)));
        assert!(m.is_active_on(day(2024, 5, 31)));
        assert!(!m.is_active_on(day(2024, 6, 1)));
    }

    #[test]
    fn test_approval_state_db_mapping() {
        assert_eq!(ApprovalState::from_db(None), ApprovalState::Approved);
        assert_eq!(ApprovalState::from_db(Some(3)), ApprovalState::Refused);
        assert_eq!(ApprovalState::Tentative.to_db(), Some(1));
        assert!(!ApprovalState::Refused.counts_as_occupant());
        assert!(ApprovalState::Invited.counts_as_occupant());
    }
}
