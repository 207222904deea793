//! Persistence seam for roles, memberships and role dependencies.
//!
//! A [`RoleStore`] value is one unit of work. Everything written through it
//! becomes visible to other readers only after [`RoleStore::commit`];
//! dropping the store or calling [`RoleStore::rollback`] discards the writes.

pub mod memory;
pub mod postgres;

use std::collections::BTreeSet;
use std::future::Future;

use chrono::NaiveDate;

use crate::errors::AppError;
use crate::models::membership::{Membership, NewMembership};
use crate::models::role::{Category, Role, RoleRecord, RoleSummary, RoleType};

pub use memory::{MemoryRoleDb, MemoryRoleStore};
pub use postgres::PgRoleStore;

pub type StoreResult<T> = Result<T, AppError>;

/// Opens units of work against a backing database.
pub trait RoleDatabase: Clone + Send + Sync + 'static {
    type Store: RoleStore;

    fn begin(&self) -> impl Future<Output = StoreResult<Self::Store>> + Send;
}

pub trait RoleStore: Send + Sized {
    // ---------------------------------------------------------------------
    // Roles and categories
    // ---------------------------------------------------------------------

    fn find_role(&mut self, role_id: i64) -> impl Future<Output = StoreResult<Option<Role>>> + Send;

    fn find_category(
        &mut self,
        category_id: i64,
    ) -> impl Future<Output = StoreResult<Option<Category>>> + Send;

    /// Whether another role (not `exclude_role_id`) with this name exists in
    /// the category, among roles visible to the organization.
    fn role_name_exists(
        &mut self,
        name: &str,
        category_id: i64,
        organization_id: i64,
        exclude_role_id: Option<i64>,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    fn insert_role(&mut self, record: &RoleRecord) -> impl Future<Output = StoreResult<i64>> + Send;

    fn update_role(
        &mut self,
        role_id: i64,
        record: &RoleRecord,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn set_role_valid(
        &mut self,
        role_id: i64,
        valid: bool,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete_role(&mut self, role_id: i64) -> impl Future<Output = StoreResult<()>> + Send;

    fn list_roles(
        &mut self,
        organization_id: i64,
        role_type: RoleType,
        as_of: NaiveDate,
    ) -> impl Future<Output = StoreResult<Vec<RoleSummary>>> + Send;

    // ---------------------------------------------------------------------
    // Dependency edges (parent -> child)
    // ---------------------------------------------------------------------

    fn get_edges(
        &mut self,
        parent_role_id: i64,
    ) -> impl Future<Output = StoreResult<BTreeSet<i64>>> + Send;

    fn get_parents(
        &mut self,
        child_role_id: i64,
    ) -> impl Future<Output = StoreResult<BTreeSet<i64>>> + Send;

    fn insert_edge(
        &mut self,
        parent_role_id: i64,
        child_role_id: i64,
        created_by: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    fn delete_edge(
        &mut self,
        parent_role_id: i64,
        child_role_id: i64,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Delete every edge where the role is parent or child. Returns the count removed.
    fn delete_all_edges(&mut self, role_id: i64) -> impl Future<Output = StoreResult<u64>> + Send;

    // ---------------------------------------------------------------------
    // Memberships
    // ---------------------------------------------------------------------

    /// Users with a current non-leader, non-refused membership.
    fn get_active_non_leader_members(
        &mut self,
        role_id: i64,
        as_of: NaiveDate,
    ) -> impl Future<Output = StoreResult<BTreeSet<i64>>> + Send;

    fn get_active_membership(
        &mut self,
        role_id: i64,
        as_of: NaiveDate,
        user_id: i64,
    ) -> impl Future<Output = StoreResult<Option<Membership>>> + Send;

    fn insert_membership(
        &mut self,
        membership: &NewMembership,
    ) -> impl Future<Output = StoreResult<i64>> + Send;

    /// Current non-leader occupants, excluding refused participations.
    fn count_occupants(
        &mut self,
        role_id: i64,
        as_of: NaiveDate,
    ) -> impl Future<Output = StoreResult<i64>> + Send;

    fn delete_memberships(&mut self, role_id: i64) -> impl Future<Output = StoreResult<u64>> + Send;

    // ---------------------------------------------------------------------
    // Unit of work
    // ---------------------------------------------------------------------

    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;

    fn rollback(self) -> impl Future<Output = StoreResult<()>> + Send;
}
