/// Integration tests for the role editor: create, edit, activate, delete and
/// list, including the dependency side effects of a save.

use std::collections::BTreeSet;

use rolekeeper::errors::AppError;
use rolekeeper::models::dependency::{self, Vacancies};
use rolekeeper::models::membership::{ApprovalState, NewMembership};
use rolekeeper::models::role::{self, RoleForm, RoleRights, RoleSchedule, RoleType};
use rolekeeper::store::RoleStore;

mod common;
use common::*;

fn form(name: &str, category_id: i64) -> RoleForm {
    RoleForm {
        name: name.to_string(),
        description: String::new(),
        category_id,
        max_members: 0,
        default_registration: false,
        schedule: RoleSchedule::default(),
        rights: RoleRights::default(),
        dependent_roles: None,
    }
}

fn ids(v: &[i64]) -> BTreeSet<i64> {
    v.iter().copied().collect()
}

// ---------------------------------------------------------------------------
// Create / edit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_role_with_dependencies() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let child = seed_role(&mut store, "Sopranos", t.groups).await;
    join(&mut store, child, 100, 10, false).await;

    let mut f = form("Choir", t.groups);
    f.dependent_roles = Some(vec![child]);
    let saved = role::save_role(&mut store, &editor_ctx(), None, &f).await.expect("save");

    assert!(saved.created);
    let outcome = saved.dependencies.expect("plain roles reconcile");
    assert_eq!(outcome.added, ids(&[child]));
    assert_eq!(outcome.propagated, 1);
    assert!(store.get_active_membership(saved.role_id, today(), 100).await.unwrap().is_some());
}

#[tokio::test]
async fn test_save_requires_manage_permission() {
    let t = setup_test_db().await;
    let mut store = t.store().await;

    let result = role::save_role(&mut store, &member_ctx(), None, &form("Choir", t.groups)).await;
    assert!(matches!(result, Err(AppError::PermissionDenied(_))));
}

#[tokio::test]
async fn test_duplicate_name_in_category_is_rejected() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    seed_role(&mut store, "Choir", t.groups).await;

    let result = role::save_role(&mut store, &editor_ctx(), None, &form("Choir", t.groups)).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // Same name in another category is fine
    let saved = role::save_role(&mut store, &editor_ctx(), None, &form("Choir", t.courses)).await;
    assert!(saved.is_ok());
}

#[tokio::test]
async fn test_edit_keeping_name_is_not_a_conflict() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let id = seed_role(&mut store, "Choir", t.groups).await;

    let mut f = form("Choir", t.groups);
    f.description = "Sings on Sundays".to_string();
    let saved = role::save_role(&mut store, &editor_ctx(), Some(id), &f).await.expect("save");

    assert!(!saved.created);
    let role = store.find_role(id).await.unwrap().unwrap();
    assert_eq!(role.description, "Sings on Sundays");
}

#[tokio::test]
async fn test_foreign_role_and_category_are_invisible() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let foreign_role = seed_role(&mut store, "Team A", t.foreign).await;

    let result = role::save_role(&mut store, &editor_ctx(), Some(foreign_role), &form("X", t.groups)).await;
    assert!(matches!(result, Err(AppError::NotFound)));

    let result = role::save_role(&mut store, &editor_ctx(), None, &form("X", t.foreign)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_roles_cannot_be_created_in_events_category() {
    let t = setup_test_db().await;
    let mut store = t.store().await;

    let result = role::save_role(&mut store, &editor_ctx(), None, &form("Summer camp", t.events)).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_administrator_role_keeps_name_and_core_rights() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let admin = seed_role(&mut store, "Administrator", t.groups).await;
    store.mark_administrator(admin);
    let child = seed_role(&mut store, "Sopranos", t.groups).await;

    let mut f = form("Renamed", t.groups);
    f.dependent_roles = Some(vec![child]);
    let saved = role::save_role(&mut store, &editor_ctx(), Some(admin), &f).await.expect("save");

    let role = store.find_role(admin).await.unwrap().unwrap();
    assert_eq!(role.name, "Administrator");
    assert!(role.rights.assign_roles);
    assert!(role.rights.all_lists_view);
    // Administrator roles never carry dependencies
    assert!(saved.dependencies.is_none());
    assert!(store.get_edges(admin).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_event_role_only_takes_limited_edits() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let event_role = seed_role(&mut store, "Summer camp", t.events).await;

    let mut f = form("Renamed", t.groups);
    f.max_members = 20;
    f.rights.photo = true;
    f.default_registration = true;
    let saved = role::save_role(&mut store, &editor_ctx(), Some(event_role), &f).await.expect("save");

    let role = store.find_role(event_role).await.unwrap().unwrap();
    assert_eq!(role.name, "Summer camp");
    assert_eq!(role.category_id, t.events);
    assert_eq!(role.max_members, 0);
    assert!(!role.rights.photo);
    assert!(!role.default_registration);
    assert!(saved.dependencies.is_none());
}

#[tokio::test]
async fn test_event_role_edit_ignores_fields_it_would_clear() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let event_role = seed_role(&mut store, "Summer camp", t.events).await;

    let mut f = form("Summer camp", t.events);
    f.max_members = -1;
    f.schedule.start_date = chrono::NaiveDate::from_ymd_opt(2024, 6, 1);
    f.schedule.end_date = chrono::NaiveDate::from_ymd_opt(2024, 5, 1);
    role::save_role(&mut store, &editor_ctx(), Some(event_role), &f).await.expect("save");

    let role = store.find_role(event_role).await.unwrap().unwrap();
    assert_eq!(role.max_members, 0);
    assert_eq!(role.schedule, RoleSchedule::default());
}

#[tokio::test]
async fn test_child_from_another_organization_is_rejected() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let parent = seed_role(&mut store, "Choir", t.groups).await;
    let foreign = seed_role(&mut store, "Team A", t.foreign).await;
    join(&mut store, foreign, 500, 10, false).await;
    store.commit().await.unwrap();

    let mut store = t.store().await;
    let mut f = form("Choir", t.groups);
    f.dependent_roles = Some(vec![foreign]);
    let result = role::save_role(&mut store, &editor_ctx(), Some(parent), &f).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
    store.rollback().await.unwrap();

    let mut store = t.store().await;
    assert!(store.get_edges(parent).await.unwrap().is_empty());
    assert!(store.memberships(parent).is_empty());
}

#[tokio::test]
async fn test_event_role_cannot_be_a_child() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let parent = seed_role(&mut store, "Choir", t.groups).await;
    let event_role = seed_role(&mut store, "Summer camp", t.events).await;
    let mut refused = NewMembership::starting(event_role, 77, days_ago(3));
    refused.approval = ApprovalState::Refused;
    store.insert_membership(&refused).await.unwrap();

    let mut f = form("Choir", t.groups);
    f.dependent_roles = Some(vec![event_role]);
    let result = role::save_role(&mut store, &editor_ctx(), Some(parent), &f).await;

    assert!(matches!(result, Err(AppError::Validation(_))));
    assert!(store.memberships(parent).is_empty());
}

// ---------------------------------------------------------------------------
// Capacity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_lowering_capacity_below_occupants_is_rejected() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let id = seed_role(&mut store, "Choir", t.groups).await;
    join(&mut store, id, 1, 5, false).await;
    join(&mut store, id, 2, 5, false).await;
    join(&mut store, id, 3, 5, true).await;

    let mut f = form("Choir", t.groups);
    f.max_members = 1;
    let result = role::save_role(&mut store, &editor_ctx(), Some(id), &f).await;
    assert!(matches!(result, Err(AppError::Capacity { vacancies: -1, .. })));

    // Leaders do not occupy places
    f.max_members = 2;
    assert!(role::save_role(&mut store, &editor_ctx(), Some(id), &f).await.is_ok());
}

#[tokio::test]
async fn test_refused_participants_do_not_occupy_places() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let id = seed_role(&mut store, "Choir", t.groups).await;
    join(&mut store, id, 1, 5, false).await;
    let mut refused = NewMembership::starting(id, 2, days_ago(5));
    refused.approval = ApprovalState::Refused;
    store.insert_membership(&refused).await.unwrap();

    let vacancies = dependency::count_vacancies(&mut store, today(), id, 1).await.unwrap();
    assert_eq!(vacancies, Vacancies::Remaining(0));
}

// ---------------------------------------------------------------------------
// Activate / delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_deactivate_and_activate() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let id = seed_role(&mut store, "Choir", t.groups).await;

    role::set_role_active(&mut store, &editor_ctx(), id, false).await.expect("deactivate");
    assert!(!store.find_role(id).await.unwrap().unwrap().valid);

    role::set_role_active(&mut store, &editor_ctx(), id, true).await.expect("activate");
    assert!(store.find_role(id).await.unwrap().unwrap().valid);
}

#[tokio::test]
async fn test_protected_roles_cannot_be_deactivated_or_deleted() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let admin = seed_role(&mut store, "Administrator", t.groups).await;
    store.mark_administrator(admin);
    let event_role = seed_role(&mut store, "Summer camp", t.events).await;

    for id in [admin, event_role] {
        let result = role::set_role_active(&mut store, &editor_ctx(), id, false).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
    let result = role::delete_role(&mut store, &editor_ctx(), admin).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_default_registration_role_cannot_be_deleted() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let mut f = form("Members", t.groups);
    f.default_registration = true;
    let saved = role::save_role(&mut store, &editor_ctx(), None, &f).await.unwrap();

    let result = role::delete_role(&mut store, &editor_ctx(), saved.role_id).await;
    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn test_delete_removes_edges_and_memberships() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let parent = seed_role(&mut store, "Choir", t.groups).await;
    let child = seed_role(&mut store, "Sopranos", t.groups).await;
    let grandchild = seed_role(&mut store, "Soloists", t.groups).await;
    dependency::reconcile(&mut store, &editor_ctx(), parent, [child]).await.unwrap();
    dependency::reconcile(&mut store, &editor_ctx(), child, [grandchild]).await.unwrap();
    join(&mut store, child, 5, 3, false).await;

    role::delete_role(&mut store, &editor_ctx(), child).await.expect("delete");

    assert!(store.find_role(child).await.unwrap().is_none());
    assert!(store.get_edges(parent).await.unwrap().is_empty());
    assert!(store.get_parents(grandchild).await.unwrap().is_empty());
    assert!(store.memberships(child).is_empty());
}

// ---------------------------------------------------------------------------
// List
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_list_counts_members_leaders_and_former() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let id = seed_role(&mut store, "Choir", t.groups).await;
    join(&mut store, id, 1, 10, false).await;
    join(&mut store, id, 2, 10, true).await;
    let mut former = NewMembership::starting(id, 3, days_ago(100));
    former.end = days_ago(20);
    store.insert_membership(&former).await.unwrap();
    seed_role(&mut store, "Team A", t.foreign).await;

    let roles = role::list_roles(&mut store, &member_ctx(), RoleType::Active).await.unwrap();

    assert_eq!(roles.len(), 1);
    let summary = &roles[0];
    assert_eq!(summary.name, "Choir");
    assert_eq!(summary.category_name, "Groups");
    assert_eq!(summary.num_members, 1);
    assert_eq!(summary.num_leaders, 1);
    assert_eq!(summary.num_former, 1);
}

#[tokio::test]
async fn test_list_filters_by_role_type() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let active = seed_role(&mut store, "Choir", t.groups).await;
    let inactive = seed_role(&mut store, "Old band", t.groups).await;
    store.set_role_valid(inactive, false).await.unwrap();
    let event_role = seed_role(&mut store, "Summer camp", t.events).await;

    let role_ids = |roles: Vec<role::RoleSummary>| roles.into_iter().map(|r| r.id).collect::<Vec<_>>();
    let ctx = member_ctx();
    assert_eq!(role_ids(role::list_roles(&mut store, &ctx, RoleType::Active).await.unwrap()), vec![active]);
    assert_eq!(role_ids(role::list_roles(&mut store, &ctx, RoleType::Inactive).await.unwrap()), vec![inactive]);
    assert_eq!(
        role_ids(role::list_roles(&mut store, &ctx, RoleType::EventParticipation).await.unwrap()),
        vec![event_role]
    );
}

// ---------------------------------------------------------------------------
// Unit of work
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_failed_save_leaves_nothing_after_rollback() {
    let t = setup_test_db().await;
    let mut store = t.store().await;
    let parent = seed_role(&mut store, "Choir", t.groups).await;
    store.commit().await.unwrap();

    let mut store = t.store().await;
    let mut f = form("Choir renamed", t.groups);
    f.dependent_roles = Some(vec![9999]);
    let result = role::save_role(&mut store, &editor_ctx(), Some(parent), &f).await;
    assert!(result.is_err());
    store.rollback().await.unwrap();

    let mut store = t.store().await;
    assert_eq!(store.find_role(parent).await.unwrap().unwrap().name, "Choir");
}
