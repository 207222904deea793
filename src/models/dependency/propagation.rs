use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::membership::NewMembership;
use crate::store::RoleStore;

/// Copy the current non-leader members of `child_role_id` into `parent_role_id`.
///
/// Users who already hold a current membership in the parent are skipped, so
/// running this twice creates nothing the second time. Existing parent
/// memberships are never changed. Returns the number of memberships created.
pub async fn propagate_membership<S: RoleStore>(
    store: &mut S,
    today: NaiveDate,
    child_role_id: i64,
    parent_role_id: i64,
) -> Result<u64, AppError> {
    let members = store.get_active_non_leader_members(child_role_id, today).await?;

    let mut created = 0;
    for user_id in members {
        if store
            .get_active_membership(parent_role_id, today, user_id)
            .await?
            .is_some()
        {
            continue;
        }
        store
            .insert_membership(&NewMembership::starting(parent_role_id, user_id, today))
            .await?;
        created += 1;
    }

    log::debug!(
        "Propagated {created} members from role {child_role_id} into role {parent_role_id}"
    );
    Ok(created)
}
