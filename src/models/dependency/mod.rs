//! Role dependencies: directed parent -> child links meaning "members of the
//! child role are also members of the parent role".
//!
//! Edges are only changed through [`reconcile`] (when a role is saved) and
//! [`remove_all_edges`] (before a role is deleted). Membership propagation
//! runs once, when an edge is created; it is one-way and one hop deep.
//! Removing an edge never removes memberships that were propagated through it.

pub mod propagation;
pub mod vacancy;

use std::collections::{BTreeSet, VecDeque};

use serde::Serialize;

use crate::auth::session::RequestContext;
use crate::errors::AppError;
use crate::store::RoleStore;

pub use propagation::propagate_membership;
pub use vacancy::{Vacancies, count_vacancies};

/// What a reconciliation changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileOutcome {
    pub added: BTreeSet<i64>,
    pub removed: BTreeSet<i64>,
    /// Memberships created in the parent role by propagation.
    pub propagated: u64,
}

impl ReconcileOutcome {
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Collapse duplicates and drop ids `<= 0`.
pub fn normalize_child_ids<I>(ids: I) -> BTreeSet<i64>
where
    I: IntoIterator<Item = i64>,
{
    ids.into_iter().filter(|&id| id > 0).collect()
}

/// Make the stored child set of `parent_role_id` equal to `desired_child_ids`.
///
/// Edges no longer desired are deleted; new edges are inserted and the
/// current non-leader members of each new child are copied into the parent.
/// All checks run before the first write, so a rejected request leaves the
/// store untouched. The caller owns the unit of work and decides to commit.
pub async fn reconcile<S, I>(
    store: &mut S,
    ctx: &RequestContext,
    parent_role_id: i64,
    desired_child_ids: I,
) -> Result<ReconcileOutcome, AppError>
where
    S: RoleStore,
    I: IntoIterator<Item = i64>,
{
    let desired = normalize_child_ids(desired_child_ids);
    let current = store.get_edges(parent_role_id).await?;

    let removed: BTreeSet<i64> = current.difference(&desired).copied().collect();
    let added: BTreeSet<i64> = desired.difference(&current).copied().collect();

    for &child in &added {
        if child == parent_role_id {
            return Err(AppError::Validation(format!(
                "Role {parent_role_id} cannot depend on itself"
            )));
        }
        let role = store
            .find_role(child)
            .await?
            .filter(|role| role.visible_to(ctx.organization_id))
            .ok_or_else(|| AppError::Validation(format!("Unknown role {child}")))?;
        if !role.accepts_dependencies() {
            return Err(AppError::Validation(format!(
                "Role {child} is an administrator or event role and cannot be linked"
            )));
        }
    }
    if !added.is_empty() {
        if let Some(child) = find_cycle(store, parent_role_id, &added).await? {
            return Err(AppError::Validation(format!(
                "Linking role {child} into role {parent_role_id} would form a cycle"
            )));
        }
    }

    for &child in &removed {
        store.delete_edge(parent_role_id, child).await?;
        log::info!("Removed role dependency {parent_role_id} -> {child}");
    }

    let mut propagated = 0;
    for &child in &added {
        store.insert_edge(parent_role_id, child, ctx.user_id).await?;
        log::info!(
            "Added role dependency {parent_role_id} -> {child} (by user {})",
            ctx.user_id
        );
        propagated += propagate_membership(store, ctx.today, child, parent_role_id).await?;
    }

    Ok(ReconcileOutcome { added, removed, propagated })
}

/// Delete every edge in which the role is parent or child. Used before a role
/// is deleted; propagated memberships stay.
pub async fn remove_all_edges<S: RoleStore>(store: &mut S, role_id: i64) -> Result<u64, AppError> {
    let removed = store.delete_all_edges(role_id).await?;
    if removed > 0 {
        log::info!("Removed {removed} dependencies of role {role_id}");
    }
    Ok(removed)
}

pub async fn child_roles<S: RoleStore>(store: &mut S, role_id: i64) -> Result<BTreeSet<i64>, AppError> {
    store.get_edges(role_id).await
}

pub async fn parent_roles<S: RoleStore>(store: &mut S, role_id: i64) -> Result<BTreeSet<i64>, AppError> {
    store.get_parents(role_id).await
}

/// Breadth-first walk along child edges from each newly added child. Returns
/// the first added child from which the parent is reachable. The walk stops
/// at the parent, so the parent's own pending edge changes never matter.
async fn find_cycle<S: RoleStore>(
    store: &mut S,
    parent_role_id: i64,
    added: &BTreeSet<i64>,
) -> Result<Option<i64>, AppError> {
    for &start in added {
        let mut seen = BTreeSet::from([start]);
        let mut queue = VecDeque::from([start]);
        while let Some(role) = queue.pop_front() {
            if role == parent_role_id {
                return Ok(Some(start));
            }
            for child in store.get_edges(role).await? {
                if seen.insert(child) {
                    queue.push_back(child);
                }
            }
        }
    }
    Ok(None)
}
