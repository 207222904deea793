//! In-process store. `begin` snapshots the shared state and `commit` merges
//! back only the rows the unit of work inserted, changed or deleted, so two
//! units of work on unrelated rows never overwrite each other. Concurrent
//! writes to the same row are last-commit-wins. Ids come from a shared
//! counter and are never handed out twice.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::NaiveDate;
use tokio::sync::Mutex;

use super::{RoleDatabase, RoleStore, StoreResult};
use crate::errors::AppError;
use crate::models::membership::{Membership, NewMembership};
use crate::models::role::{Category, Role, RoleRecord, RoleSummary, RoleType};

#[derive(Debug, Clone, PartialEq)]
struct StoredRole {
    record: RoleRecord,
    valid: bool,
    administrator: bool,
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    categories: BTreeMap<i64, Category>,
    roles: BTreeMap<i64, StoredRole>,
    /// (parent, child) -> created_by
    edges: BTreeMap<(i64, i64), i64>,
    memberships: BTreeMap<i64, Membership>,
}

impl MemoryState {
    fn resolve(&self, role_id: i64) -> Option<Role> {
        let stored = self.roles.get(&role_id)?;
        let category = self.categories.get(&stored.record.category_id)?;
        let record = &stored.record;
        Some(Role {
            id: role_id,
            name: record.name.clone(),
            description: record.description.clone(),
            category_id: record.category_id,
            organization_id: category.organization_id,
            is_event_role: category.is_events(),
            max_members: record.max_members,
            valid: stored.valid,
            administrator: stored.administrator,
            default_registration: record.default_registration,
            schedule: record.schedule.clone(),
            rights: record.rights,
        })
    }

    fn active_in(&self, role_id: i64, as_of: NaiveDate) -> impl Iterator<Item = &Membership> {
        self.memberships
            .values()
            .filter(move |m| m.role_id == role_id && m.is_active_on(as_of))
    }
}

/// Shared in-memory database handle.
#[derive(Debug, Clone, Default)]
pub struct MemoryRoleDb {
    state: Arc<Mutex<MemoryState>>,
    last_id: Arc<AtomicI64>,
}

impl MemoryRoleDb {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RoleDatabase for MemoryRoleDb {
    type Store = MemoryRoleStore;

    async fn begin(&self) -> StoreResult<MemoryRoleStore> {
        let snapshot = self.state.lock().await.clone();
        Ok(MemoryRoleStore {
            shared: Arc::clone(&self.state),
            last_id: Arc::clone(&self.last_id),
            base: snapshot.clone(),
            working: snapshot,
        })
    }
}

/// One unit of work over a [`MemoryRoleDb`].
#[derive(Debug)]
pub struct MemoryRoleStore {
    shared: Arc<Mutex<MemoryState>>,
    last_id: Arc<AtomicI64>,
    /// State as of `begin`, used to find what this unit of work changed.
    base: MemoryState,
    working: MemoryState,
}

/// Apply the difference between `base` and `working` to `shared`.
fn merge_changes<K, V>(shared: &mut BTreeMap<K, V>, base: &BTreeMap<K, V>, working: &BTreeMap<K, V>)
where
    K: Ord + Clone,
    V: Clone + PartialEq,
{
    for (key, value) in working {
        if base.get(key) != Some(value) {
            shared.insert(key.clone(), value.clone());
        }
    }
    for key in base.keys() {
        if !working.contains_key(key) {
            shared.remove(key);
        }
    }
}

impl MemoryRoleStore {
    fn next_id(&self) -> i64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Seed a category. Categories have no editing flow of their own.
    pub fn add_category(&mut self, organization_id: Option<i64>, name: &str, name_intern: &str) -> i64 {
        let id = self.next_id();
        self.working.categories.insert(
            id,
            Category {
                id,
                organization_id,
                name: name.to_string(),
                name_intern: name_intern.to_string(),
            },
        );
        id
    }

    /// Flag a seeded role as the protected administrator role.
    pub fn mark_administrator(&mut self, role_id: i64) {
        if let Some(role) = self.working.roles.get_mut(&role_id) {
            role.administrator = true;
        }
    }

    /// All membership rows of a role, current or not, in insertion order.
    pub fn memberships(&self, role_id: i64) -> Vec<Membership> {
        self.working
            .memberships
            .values()
            .filter(|m| m.role_id == role_id)
            .cloned()
            .collect()
    }
}

impl RoleStore for MemoryRoleStore {
    async fn find_role(&mut self, role_id: i64) -> StoreResult<Option<Role>> {
        Ok(self.working.resolve(role_id))
    }

    async fn find_category(&mut self, category_id: i64) -> StoreResult<Option<Category>> {
        Ok(self.working.categories.get(&category_id).cloned())
    }

    async fn role_name_exists(
        &mut self,
        name: &str,
        category_id: i64,
        organization_id: i64,
        exclude_role_id: Option<i64>,
    ) -> StoreResult<bool> {
        let exists = self.working.roles.keys().any(|&id| {
            Some(id) != exclude_role_id
                && self.working.resolve(id).is_some_and(|role| {
                    role.name == name && role.category_id == category_id && role.visible_to(organization_id)
                })
        });
        Ok(exists)
    }

    async fn insert_role(&mut self, record: &RoleRecord) -> StoreResult<i64> {
        if !self.working.categories.contains_key(&record.category_id) {
            return Err(AppError::Validation(format!("Unknown category {}", record.category_id)));
        }
        let id = self.next_id();
        self.working.roles.insert(
            id,
            StoredRole {
                record: record.clone(),
                valid: true,
                administrator: false,
            },
        );
        Ok(id)
    }

    async fn update_role(&mut self, role_id: i64, record: &RoleRecord) -> StoreResult<()> {
        let stored = self.working.roles.get_mut(&role_id).ok_or(AppError::NotFound)?;
        stored.record = record.clone();
        Ok(())
    }

    async fn set_role_valid(&mut self, role_id: i64, valid: bool) -> StoreResult<()> {
        let stored = self.working.roles.get_mut(&role_id).ok_or(AppError::NotFound)?;
        stored.valid = valid;
        Ok(())
    }

    async fn delete_role(&mut self, role_id: i64) -> StoreResult<()> {
        let referenced = self.working.memberships.values().any(|m| m.role_id == role_id)
            || self.working.edges.keys().any(|&(p, c)| p == role_id || c == role_id);
        if referenced {
            // Mirrors the foreign keys of the relational schema.
            return Err(AppError::Conflict(format!("Role {role_id} is still referenced")));
        }
        self.working.roles.remove(&role_id);
        Ok(())
    }

    async fn list_roles(
        &mut self,
        organization_id: i64,
        role_type: RoleType,
        as_of: NaiveDate,
    ) -> StoreResult<Vec<RoleSummary>> {
        let state = &self.working;
        let mut rows: Vec<(String, RoleSummary)> = state
            .roles
            .keys()
            .filter_map(|&id| state.resolve(id))
            .filter(|role| role.visible_to(organization_id))
            .filter(|role| match role_type {
                RoleType::Inactive => !role.valid && !role.is_event_role,
                RoleType::Active => role.valid && !role.is_event_role,
                RoleType::EventParticipation => role.is_event_role,
            })
            .map(|role| {
                let active: Vec<&Membership> = state.active_in(role.id, as_of).collect();
                let num_members = active
                    .iter()
                    .filter(|m| !m.leader && m.approval.counts_as_occupant())
                    .count() as i64;
                let num_leaders = active.iter().filter(|m| m.leader).count() as i64;
                let current_users: BTreeSet<i64> = active.iter().map(|m| m.user_id).collect();
                let former_users: BTreeSet<i64> = state
                    .memberships
                    .values()
                    .filter(|m| m.role_id == role.id && m.end <= as_of)
                    .map(|m| m.user_id)
                    .filter(|user_id| !current_users.contains(user_id))
                    .collect();
                let category_name = state
                    .categories
                    .get(&role.category_id)
                    .map(|c| c.name.clone())
                    .unwrap_or_default();
                (
                    category_name.clone(),
                    RoleSummary {
                        id: role.id,
                        name: role.name,
                        category_name,
                        max_members: role.max_members,
                        num_members,
                        num_leaders,
                        num_former: former_users.len() as i64,
                    },
                )
            })
            .collect();
        rows.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));
        Ok(rows.into_iter().map(|(_, summary)| summary).collect())
    }

    async fn get_edges(&mut self, parent_role_id: i64) -> StoreResult<BTreeSet<i64>> {
        Ok(self
            .working
            .edges
            .keys()
            .filter(|(parent, _)| *parent == parent_role_id)
            .map(|(_, child)| *child)
            .collect())
    }

    async fn get_parents(&mut self, child_role_id: i64) -> StoreResult<BTreeSet<i64>> {
        Ok(self
            .working
            .edges
            .keys()
            .filter(|(_, child)| *child == child_role_id)
            .map(|(parent, _)| *parent)
            .collect())
    }

    async fn insert_edge(&mut self, parent_role_id: i64, child_role_id: i64, created_by: i64) -> StoreResult<()> {
        for id in [parent_role_id, child_role_id] {
            if !self.working.roles.contains_key(&id) {
                return Err(AppError::Validation(format!("Unknown role {id}")));
            }
        }
        if self.working.edges.contains_key(&(parent_role_id, child_role_id)) {
            return Err(AppError::Conflict(format!(
                "Dependency {parent_role_id} -> {child_role_id} already exists"
            )));
        }
        self.working.edges.insert((parent_role_id, child_role_id), created_by);
        Ok(())
    }

    async fn delete_edge(&mut self, parent_role_id: i64, child_role_id: i64) -> StoreResult<()> {
        self.working.edges.remove(&(parent_role_id, child_role_id));
        Ok(())
    }

    async fn delete_all_edges(&mut self, role_id: i64) -> StoreResult<u64> {
        let before = self.working.edges.len();
        self.working
            .edges
            .retain(|&(parent, child), _| parent != role_id && child != role_id);
        Ok((before - self.working.edges.len()) as u64)
    }

    async fn get_active_non_leader_members(&mut self, role_id: i64, as_of: NaiveDate) -> StoreResult<BTreeSet<i64>> {
        Ok(self
            .working
            .active_in(role_id, as_of)
            .filter(|m| !m.leader && m.approval.counts_as_occupant())
            .map(|m| m.user_id)
            .collect())
    }

    async fn get_active_membership(
        &mut self,
        role_id: i64,
        as_of: NaiveDate,
        user_id: i64,
    ) -> StoreResult<Option<Membership>> {
        Ok(self
            .working
            .active_in(role_id, as_of)
            .find(|m| m.user_id == user_id)
            .cloned())
    }

    async fn insert_membership(&mut self, membership: &NewMembership) -> StoreResult<i64> {
        if !self.working.roles.contains_key(&membership.role_id) {
            return Err(AppError::Validation(format!("Unknown role {}", membership.role_id)));
        }
        let id = self.next_id();
        self.working.memberships.insert(
            id,
            Membership {
                id,
                user_id: membership.user_id,
                role_id: membership.role_id,
                begin: membership.begin,
                end: membership.end,
                leader: membership.leader,
                approval: membership.approval,
            },
        );
        Ok(id)
    }

    async fn count_occupants(&mut self, role_id: i64, as_of: NaiveDate) -> StoreResult<i64> {
        Ok(self
            .working
            .active_in(role_id, as_of)
            .filter(|m| !m.leader && m.approval.counts_as_occupant())
            .count() as i64)
    }

    async fn delete_memberships(&mut self, role_id: i64) -> StoreResult<u64> {
        let before = self.working.memberships.len();
        self.working.memberships.retain(|_, m| m.role_id != role_id);
        Ok((before - self.working.memberships.len()) as u64)
    }

    async fn commit(self) -> StoreResult<()> {
        let mut shared = self.shared.lock().await;
        merge_changes(&mut shared.categories, &self.base.categories, &self.working.categories);
        merge_changes(&mut shared.roles, &self.base.roles, &self.working.roles);
        merge_changes(&mut shared.edges, &self.base.edges, &self.working.edges);
        merge_changes(&mut shared.memberships, &self.base.memberships, &self.working.memberships);
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}
