use chrono::NaiveDate;
use serde::Serialize;

use crate::errors::AppError;
use crate::store::RoleStore;

/// Free places a role would have under a given capacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "remaining", rename_all = "snake_case")]
pub enum Vacancies {
    /// Capacity 0: no limit.
    Unlimited,
    /// Capacity minus current non-leader occupants. Negative when the
    /// capacity is already exceeded.
    Remaining(i64),
}

impl Vacancies {
    pub fn is_violated(self) -> bool {
        matches!(self, Vacancies::Remaining(n) if n < 0)
    }
}

/// Evaluate a proposed capacity against the current occupants of a role.
///
/// Leaders and refused participations do not count. The read is a plain
/// snapshot; a concurrent request may still add members afterwards.
pub async fn count_vacancies<S: RoleStore>(
    store: &mut S,
    today: NaiveDate,
    role_id: i64,
    proposed_capacity: i32,
) -> Result<Vacancies, AppError> {
    if proposed_capacity <= 0 {
        return Ok(Vacancies::Unlimited);
    }
    let occupants = store.count_occupants(role_id, today).await?;
    Ok(Vacancies::Remaining(i64::from(proposed_capacity) - occupants))
}
