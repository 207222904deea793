use serde::Serialize;

use super::form::RoleForm;
use super::types::{Role, RoleRecord, RoleRights, RoleSchedule, RoleSummary, RoleType};
use crate::auth::session::{MANAGE_ROLES, RequestContext};
use crate::errors::AppError;
use crate::models::dependency::{self, ReconcileOutcome, Vacancies};
use crate::store::RoleStore;

/// Result of a role save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedRole {
    pub role_id: i64,
    pub created: bool,
    /// `None` when the role kind never carries dependencies.
    pub dependencies: Option<ReconcileOutcome>,
}

/// Load a role the current organization may edit.
pub async fn find_editable<S: RoleStore>(
    store: &mut S,
    ctx: &RequestContext,
    role_id: i64,
) -> Result<Role, AppError> {
    store
        .find_role(role_id)
        .await?
        .filter(|role| role.visible_to(ctx.organization_id))
        .ok_or(AppError::NotFound)
}

/// Administrator roles keep their name and always assign roles and see all lists.
fn apply_administrator_overrides(record: &mut RoleRecord, role: &Role) {
    record.name = role.name.clone();
    record.rights.assign_roles = true;
    record.rights.all_lists_view = true;
}

/// Event roles are owned by their event: only capacity-free, right-free
/// participation is allowed, and identity fields stay as they are. Nothing
/// submitted for them survives, so their form is not validated.
fn event_role_record(role: &Role) -> RoleRecord {
    RoleRecord {
        name: role.name.clone(),
        description: role.description.clone(),
        category_id: role.category_id,
        max_members: 0,
        default_registration: false,
        schedule: RoleSchedule::default(),
        rights: RoleRights::default(),
    }
}

/// Create (`role_id == None`) or edit a role, then reconcile its child roles.
///
/// Runs entirely inside the caller's unit of work: the role attributes are
/// written first and the dependency changes after, so a failure in either
/// leaves nothing behind once the caller drops the store.
pub async fn save_role<S: RoleStore>(
    store: &mut S,
    ctx: &RequestContext,
    role_id: Option<i64>,
    form: &RoleForm,
) -> Result<SavedRole, AppError> {
    ctx.require_permission(MANAGE_ROLES)?;

    let existing = match role_id {
        Some(id) => Some(find_editable(store, ctx, id).await?),
        None => None,
    };

    let mut record = match existing.as_ref().filter(|role| role.is_event_role) {
        Some(role) => event_role_record(role),
        None => form.validate()?,
    };
    if let Some(role) = existing.as_ref().filter(|role| role.administrator) {
        apply_administrator_overrides(&mut record, role);
    }

    let category = store
        .find_category(record.category_id)
        .await?
        .filter(|c| c.visible_to(ctx.organization_id))
        .ok_or_else(|| AppError::Validation(format!("Unknown category {}", record.category_id)))?;
    let is_event_role = existing.as_ref().is_some_and(|r| r.is_event_role);
    if category.is_events() && !is_event_role {
        return Err(AppError::Validation(
            "Event participation roles are managed by their event".to_string(),
        ));
    }

    let identity_changed = existing
        .as_ref()
        .is_none_or(|r| r.name != record.name || r.category_id != record.category_id);
    if identity_changed
        && store
            .role_name_exists(&record.name, record.category_id, ctx.organization_id, role_id)
            .await?
    {
        return Err(AppError::Conflict(format!(
            "A role named '{}' already exists in this category",
            record.name
        )));
    }

    if let Some(role) = &existing {
        if record.max_members != role.max_members {
            let vacancies =
                dependency::count_vacancies(store, ctx.today, role.id, record.max_members).await?;
            if let Vacancies::Remaining(n) = vacancies
                && vacancies.is_violated()
            {
                return Err(AppError::Capacity { role_id: role.id, vacancies: n });
            }
        }
    }

    let (id, created) = match &existing {
        Some(role) => {
            store.update_role(role.id, &record).await?;
            (role.id, false)
        }
        None => (store.insert_role(&record).await?, true),
    };
    log::info!(
        "Role {id} '{}' {} by user {}",
        record.name,
        if created { "created" } else { "updated" },
        ctx.user_id
    );

    let accepts_dependencies = existing.as_ref().is_none_or(|r| r.accepts_dependencies());
    let dependencies = if accepts_dependencies {
        let desired = form.dependent_roles.clone().unwrap_or_default();
        Some(dependency::reconcile(store, ctx, id, desired).await?)
    } else {
        None
    };

    Ok(SavedRole { role_id: id, created, dependencies })
}

/// Activate or deactivate a role. Administrator and event roles are fixed.
pub async fn set_role_active<S: RoleStore>(
    store: &mut S,
    ctx: &RequestContext,
    role_id: i64,
    active: bool,
) -> Result<(), AppError> {
    ctx.require_permission(MANAGE_ROLES)?;
    let role = find_editable(store, ctx, role_id).await?;
    if role.administrator {
        return Err(AppError::Validation(
            "The administrator role cannot be activated or deactivated".to_string(),
        ));
    }
    if role.is_event_role {
        return Err(AppError::Validation(
            "Event participation roles cannot be activated or deactivated".to_string(),
        ));
    }
    if role.valid != active {
        store.set_role_valid(role_id, active).await?;
        log::info!(
            "Role {role_id} {} by user {}",
            if active { "activated" } else { "deactivated" },
            ctx.user_id
        );
    }
    Ok(())
}

/// Delete a role together with its dependencies and memberships.
pub async fn delete_role<S: RoleStore>(
    store: &mut S,
    ctx: &RequestContext,
    role_id: i64,
) -> Result<(), AppError> {
    ctx.require_permission(MANAGE_ROLES)?;
    let role = find_editable(store, ctx, role_id).await?;
    if role.administrator {
        return Err(AppError::Validation("The administrator role cannot be deleted".to_string()));
    }
    if role.default_registration {
        return Err(AppError::Validation(
            "The default registration role cannot be deleted".to_string(),
        ));
    }

    dependency::remove_all_edges(store, role_id).await?;
    let memberships = store.delete_memberships(role_id).await?;
    store.delete_role(role_id).await?;
    log::info!(
        "Role {role_id} '{}' deleted with {memberships} memberships by user {}",
        role.name,
        ctx.user_id
    );
    Ok(())
}

/// Role overview for the current organization.
pub async fn list_roles<S: RoleStore>(
    store: &mut S,
    ctx: &RequestContext,
    role_type: RoleType,
) -> Result<Vec<RoleSummary>, AppError> {
    store.list_roles(ctx.organization_id, role_type, ctx.today).await
}
