use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime};
use sqlx::{PgPool, Postgres, Transaction};

use super::{RoleDatabase, RoleStore, StoreResult};
use crate::models::membership::{ApprovalState, Membership, NewMembership};
use crate::models::role::{
    Category, EVENTS_CATEGORY, Role, RoleRecord, RoleRights, RoleSchedule, RoleSummary, RoleType,
    weekday_from_db, weekday_to_db,
};

const ROLE_COLUMNS: &str = "r.id, r.name, r.description, r.category_id, \
    c.organization_id, c.name_intern AS category_name_intern, \
    r.max_members, r.valid, r.administrator, r.default_registration, \
    r.start_date, r.end_date, r.start_time, r.end_time, r.weekday, r.location, \
    r.assign_roles, r.approve_users, r.announcements, r.dates, r.photo, \
    r.documents_files, r.guestbook, r.guestbook_comments, r.edit_user, \
    r.weblinks, r.all_lists_view, r.mail_to_all, r.profile";

#[derive(sqlx::FromRow)]
struct RoleRow {
    id: i64,
    name: String,
    description: String,
    category_id: i64,
    organization_id: Option<i64>,
    category_name_intern: String,
    max_members: i32,
    valid: bool,
    administrator: bool,
    default_registration: bool,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    start_time: Option<NaiveTime>,
    end_time: Option<NaiveTime>,
    weekday: Option<i16>,
    location: String,
    assign_roles: bool,
    approve_users: bool,
    announcements: bool,
    dates: bool,
    photo: bool,
    documents_files: bool,
    guestbook: bool,
    guestbook_comments: bool,
    edit_user: bool,
    weblinks: bool,
    all_lists_view: bool,
    mail_to_all: bool,
    profile: bool,
}

impl From<RoleRow> for Role {
    fn from(row: RoleRow) -> Self {
        Role {
            id: row.id,
            name: row.name,
            description: row.description,
            category_id: row.category_id,
            organization_id: row.organization_id,
            is_event_role: row.category_name_intern == EVENTS_CATEGORY,
            max_members: row.max_members,
            valid: row.valid,
            administrator: row.administrator,
            default_registration: row.default_registration,
            schedule: RoleSchedule {
                start_date: row.start_date,
                end_date: row.end_date,
                start_time: row.start_time,
                end_time: row.end_time,
                weekday: weekday_from_db(row.weekday),
                location: row.location,
            },
            rights: RoleRights {
                assign_roles: row.assign_roles,
                approve_users: row.approve_users,
                announcements: row.announcements,
                dates: row.dates,
                photo: row.photo,
                documents_files: row.documents_files,
                guestbook: row.guestbook,
                guestbook_comments: row.guestbook_comments,
                edit_user: row.edit_user,
                weblinks: row.weblinks,
                all_lists_view: row.all_lists_view,
                mail_to_all: row.mail_to_all,
                profile: row.profile,
            },
        }
    }
}

#[derive(sqlx::FromRow)]
struct MembershipRow {
    id: i64,
    user_id: i64,
    role_id: i64,
    begin_date: NaiveDate,
    end_date: NaiveDate,
    leader: bool,
    approval: Option<i16>,
}

impl From<MembershipRow> for Membership {
    fn from(row: MembershipRow) -> Self {
        Membership {
            id: row.id,
            user_id: row.user_id,
            role_id: row.role_id,
            begin: row.begin_date,
            end: row.end_date,
            leader: row.leader,
            approval: ApprovalState::from_db(row.approval),
        }
    }
}

#[derive(sqlx::FromRow)]
struct CategoryRow {
    id: i64,
    organization_id: Option<i64>,
    name: String,
    name_intern: String,
}

/// Unit of work backed by a PostgreSQL transaction.
pub struct PgRoleStore {
    tx: Transaction<'static, Postgres>,
}

impl PgRoleStore {
    pub async fn begin(pool: &PgPool) -> StoreResult<Self> {
        Ok(PgRoleStore { tx: pool.begin().await? })
    }

    /// Seed a category. Categories have no editing flow of their own.
    pub async fn add_category(
        &mut self,
        organization_id: Option<i64>,
        name: &str,
        name_intern: &str,
    ) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO categories (organization_id, name, name_intern) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(organization_id)
        .bind(name)
        .bind(name_intern)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    /// Flag a role as the protected administrator role.
    pub async fn mark_administrator(&mut self, role_id: i64) -> StoreResult<()> {
        sqlx::query("UPDATE roles SET administrator = TRUE WHERE id = $1")
            .bind(role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    /// All membership rows of a role, current or not.
    pub async fn memberships(&mut self, role_id: i64) -> StoreResult<Vec<Membership>> {
        let rows = sqlx::query_as::<_, MembershipRow>(
            "SELECT id, user_id, role_id, begin_date, end_date, leader, approval \
             FROM memberships WHERE role_id = $1 ORDER BY id",
        )
        .bind(role_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(rows.into_iter().map(Membership::from).collect())
    }
}

impl RoleDatabase for PgPool {
    type Store = PgRoleStore;

    async fn begin(&self) -> StoreResult<PgRoleStore> {
        PgRoleStore::begin(self).await
    }
}

impl RoleStore for PgRoleStore {
    async fn find_role(&mut self, role_id: i64) -> StoreResult<Option<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles r JOIN categories c ON c.id = r.category_id WHERE r.id = $1"
        );
        let row = sqlx::query_as::<_, RoleRow>(&sql)
            .bind(role_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(Role::from))
    }

    async fn find_category(&mut self, category_id: i64) -> StoreResult<Option<Category>> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, organization_id, name, name_intern FROM categories WHERE id = $1",
        )
        .bind(category_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(|c| Category {
            id: c.id,
            organization_id: c.organization_id,
            name: c.name,
            name_intern: c.name_intern,
        }))
    }

    async fn role_name_exists(
        &mut self,
        name: &str,
        category_id: i64,
        organization_id: i64,
        exclude_role_id: Option<i64>,
    ) -> StoreResult<bool> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM roles r \
             JOIN categories c ON c.id = r.category_id \
             WHERE r.name = $1 AND r.category_id = $2 \
               AND ($3::BIGINT IS NULL OR r.id <> $3) \
               AND (c.organization_id = $4 OR c.organization_id IS NULL)",
        )
        .bind(name)
        .bind(category_id)
        .bind(exclude_role_id)
        .bind(organization_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count > 0)
    }

    async fn insert_role(&mut self, record: &RoleRecord) -> StoreResult<i64> {
        let s = &record.schedule;
        let r = &record.rights;
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO roles (name, description, category_id, max_members, default_registration, \
                 start_date, end_date, start_time, end_time, weekday, location, \
                 assign_roles, approve_users, announcements, dates, photo, documents_files, \
                 guestbook, guestbook_comments, edit_user, weblinks, all_lists_view, mail_to_all, profile) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, \
                     $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24) \
             RETURNING id",
        )
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.category_id)
        .bind(record.max_members)
        .bind(record.default_registration)
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.start_time)
        .bind(s.end_time)
        .bind(weekday_to_db(s.weekday))
        .bind(&s.location)
        .bind(r.assign_roles)
        .bind(r.approve_users)
        .bind(r.announcements)
        .bind(r.dates)
        .bind(r.photo)
        .bind(r.documents_files)
        .bind(r.guestbook)
        .bind(r.guestbook_comments)
        .bind(r.edit_user)
        .bind(r.weblinks)
        .bind(r.all_lists_view)
        .bind(r.mail_to_all)
        .bind(r.profile)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn update_role(&mut self, role_id: i64, record: &RoleRecord) -> StoreResult<()> {
        let s = &record.schedule;
        let r = &record.rights;
        sqlx::query(
            "UPDATE roles SET name = $1, description = $2, category_id = $3, max_members = $4, \
                 default_registration = $5, start_date = $6, end_date = $7, start_time = $8, \
                 end_time = $9, weekday = $10, location = $11, \
                 assign_roles = $12, approve_users = $13, announcements = $14, dates = $15, \
                 photo = $16, documents_files = $17, guestbook = $18, guestbook_comments = $19, \
                 edit_user = $20, weblinks = $21, all_lists_view = $22, mail_to_all = $23, \
                 profile = $24, updated_at = NOW() \
             WHERE id = $25",
        )
        .bind(&record.name)
        .bind(&record.description)
        .bind(record.category_id)
        .bind(record.max_members)
        .bind(record.default_registration)
        .bind(s.start_date)
        .bind(s.end_date)
        .bind(s.start_time)
        .bind(s.end_time)
        .bind(weekday_to_db(s.weekday))
        .bind(&s.location)
        .bind(r.assign_roles)
        .bind(r.approve_users)
        .bind(r.announcements)
        .bind(r.dates)
        .bind(r.photo)
        .bind(r.documents_files)
        .bind(r.guestbook)
        .bind(r.guestbook_comments)
        .bind(r.edit_user)
        .bind(r.weblinks)
        .bind(r.all_lists_view)
        .bind(r.mail_to_all)
        .bind(r.profile)
        .bind(role_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn set_role_valid(&mut self, role_id: i64, valid: bool) -> StoreResult<()> {
        sqlx::query("UPDATE roles SET valid = $1, updated_at = NOW() WHERE id = $2")
            .bind(valid)
            .bind(role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_role(&mut self, role_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn list_roles(
        &mut self,
        organization_id: i64,
        role_type: RoleType,
        as_of: NaiveDate,
    ) -> StoreResult<Vec<RoleSummary>> {
        let type_filter = match role_type {
            RoleType::Inactive => "r.valid = FALSE AND c.name_intern <> 'EVENTS'",
            RoleType::Active => "r.valid = TRUE AND c.name_intern <> 'EVENTS'",
            RoleType::EventParticipation => "c.name_intern = 'EVENTS'",
        };
        let sql = format!(
            "SELECT r.id, r.name, c.name AS category_name, r.max_members, \
                    (SELECT COUNT(*) FROM memberships m \
                     WHERE m.role_id = r.id AND m.begin_date <= $2 AND m.end_date > $2 \
                       AND m.leader = FALSE AND (m.approval IS NULL OR m.approval < 3)) AS num_members, \
                    (SELECT COUNT(*) FROM memberships m \
                     WHERE m.role_id = r.id AND m.begin_date <= $2 AND m.end_date > $2 \
                       AND m.leader = TRUE) AS num_leaders, \
                    (SELECT COUNT(DISTINCT m.user_id) FROM memberships m \
                     WHERE m.role_id = r.id AND m.end_date <= $2 \
                       AND NOT EXISTS (SELECT 1 FROM memberships act \
                                       WHERE act.role_id = m.role_id AND act.user_id = m.user_id \
                                         AND act.begin_date <= $2 AND act.end_date > $2)) AS num_former \
             FROM roles r \
             JOIN categories c ON c.id = r.category_id \
             WHERE (c.organization_id = $1 OR c.organization_id IS NULL) \
               AND {type_filter} \
             ORDER BY c.name, r.name"
        );
        let rows = sqlx::query_as::<_, (i64, String, String, i32, i64, i64, i64)>(&sql)
            .bind(organization_id)
            .bind(as_of)
            .fetch_all(&mut *self.tx)
            .await?;
        Ok(rows
            .into_iter()
            .map(
                |(id, name, category_name, max_members, num_members, num_leaders, num_former)| RoleSummary {
                    id,
                    name,
                    category_name,
                    max_members,
                    num_members,
                    num_leaders,
                    num_former,
                },
            )
            .collect())
    }

    async fn get_edges(&mut self, parent_role_id: i64) -> StoreResult<BTreeSet<i64>> {
        let children: Vec<i64> = sqlx::query_scalar(
            "SELECT child_role_id FROM role_dependencies WHERE parent_role_id = $1",
        )
        .bind(parent_role_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(children.into_iter().collect())
    }

    async fn get_parents(&mut self, child_role_id: i64) -> StoreResult<BTreeSet<i64>> {
        let parents: Vec<i64> = sqlx::query_scalar(
            "SELECT parent_role_id FROM role_dependencies WHERE child_role_id = $1",
        )
        .bind(child_role_id)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(parents.into_iter().collect())
    }

    async fn insert_edge(&mut self, parent_role_id: i64, child_role_id: i64, created_by: i64) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO role_dependencies (parent_role_id, child_role_id, created_by) VALUES ($1, $2, $3)",
        )
        .bind(parent_role_id)
        .bind(child_role_id)
        .bind(created_by)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_edge(&mut self, parent_role_id: i64, child_role_id: i64) -> StoreResult<()> {
        sqlx::query("DELETE FROM role_dependencies WHERE parent_role_id = $1 AND child_role_id = $2")
            .bind(parent_role_id)
            .bind(child_role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn delete_all_edges(&mut self, role_id: i64) -> StoreResult<u64> {
        let result = sqlx::query(
            "DELETE FROM role_dependencies WHERE parent_role_id = $1 OR child_role_id = $1",
        )
        .bind(role_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn get_active_non_leader_members(&mut self, role_id: i64, as_of: NaiveDate) -> StoreResult<BTreeSet<i64>> {
        let users: Vec<i64> = sqlx::query_scalar(
            "SELECT DISTINCT user_id FROM memberships \
             WHERE role_id = $1 AND begin_date <= $2 AND end_date > $2 AND leader = FALSE \
               AND (approval IS NULL OR approval < 3)",
        )
        .bind(role_id)
        .bind(as_of)
        .fetch_all(&mut *self.tx)
        .await?;
        Ok(users.into_iter().collect())
    }

    async fn get_active_membership(
        &mut self,
        role_id: i64,
        as_of: NaiveDate,
        user_id: i64,
    ) -> StoreResult<Option<Membership>> {
        let row = sqlx::query_as::<_, MembershipRow>(
            "SELECT id, user_id, role_id, begin_date, end_date, leader, approval \
             FROM memberships \
             WHERE role_id = $1 AND user_id = $2 AND begin_date <= $3 AND end_date > $3 \
             ORDER BY begin_date LIMIT 1",
        )
        .bind(role_id)
        .bind(user_id)
        .bind(as_of)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Membership::from))
    }

    async fn insert_membership(&mut self, membership: &NewMembership) -> StoreResult<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO memberships (role_id, user_id, begin_date, end_date, leader, approval) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
        )
        .bind(membership.role_id)
        .bind(membership.user_id)
        .bind(membership.begin)
        .bind(membership.end)
        .bind(membership.leader)
        .bind(membership.approval.to_db())
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(id)
    }

    async fn count_occupants(&mut self, role_id: i64, as_of: NaiveDate) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM memberships \
             WHERE role_id = $1 AND begin_date <= $2 AND end_date > $2 \
               AND leader = FALSE AND (approval IS NULL OR approval < 3)",
        )
        .bind(role_id)
        .bind(as_of)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(count)
    }

    async fn delete_memberships(&mut self, role_id: i64) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM memberships WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
