//! Shared test infrastructure for role and dependency tests.
//!
//! # Test Database Setup
//! - `setup_test_db()` - in-memory store seeded with one organization's categories
//! - `setup_pg_db()` - PostgreSQL pool from `DATABASE_URL`, or `None` to skip
//! - `test_app()` - actix service over a `MemoryRoleDb` with a login helper route

#![allow(dead_code)]

use actix_session::{Session, SessionMiddleware, storage::CookieSessionStore};
use actix_web::cookie::{Cookie, Key};
use actix_web::{App, HttpResponse, web};
use chrono::NaiveDate;
use serde::Deserialize;
use sqlx::PgPool;

use rolekeeper::auth::session::{MANAGE_ROLES, Permissions, RequestContext};
use rolekeeper::handlers;
use rolekeeper::models::membership::NewMembership;
use rolekeeper::models::role::{EVENTS_CATEGORY, RoleRecord};
use rolekeeper::store::{MemoryRoleDb, MemoryRoleStore, RoleDatabase, RoleStore};

// ============================================================================
// TEST CONSTANTS
// ============================================================================

pub const ORG_ID: i64 = 1;
pub const OTHER_ORG_ID: i64 = 2;
pub const EDITOR_USER_ID: i64 = 42;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, 15).unwrap()
}

pub fn days_ago(n: i64) -> NaiveDate {
    today() - chrono::Duration::days(n)
}

/// Editor of `ORG_ID` holding the role management permission.
pub fn editor_ctx() -> RequestContext {
    RequestContext::new(EDITOR_USER_ID, ORG_ID, Permissions::from_csv(MANAGE_ROLES), today())
}

/// Logged-in member of `ORG_ID` without any permissions.
pub fn member_ctx() -> RequestContext {
    RequestContext::new(7, ORG_ID, Permissions::default(), today())
}

// ============================================================================
// DATABASE SETUP
// ============================================================================

/// Seeded in-memory database.
pub struct TestDb {
    pub db: MemoryRoleDb,
    /// Ordinary category of `ORG_ID`.
    pub groups: i64,
    /// Second ordinary category of `ORG_ID`.
    pub courses: i64,
    /// Event participation category of `ORG_ID`.
    pub events: i64,
    /// Category of `OTHER_ORG_ID`.
    pub foreign: i64,
}

impl TestDb {
    pub async fn store(&self) -> MemoryRoleStore {
        self.db.begin().await.expect("begin")
    }
}

pub async fn setup_test_db() -> TestDb {
    let db = MemoryRoleDb::new();
    let mut store = db.begin().await.expect("begin");
    let groups = store.add_category(Some(ORG_ID), "Groups", "GROUPS");
    let courses = store.add_category(Some(ORG_ID), "Courses", "COURSES");
    let events = store.add_category(Some(ORG_ID), "Events", EVENTS_CATEGORY);
    let foreign = store.add_category(Some(OTHER_ORG_ID), "Teams", "TEAMS");
    store.commit().await.expect("commit");
    TestDb { db, groups, courses, events, foreign }
}

/// Insert a role directly, bypassing the editor.
pub async fn seed_role<S: RoleStore>(store: &mut S, name: &str, category_id: i64) -> i64 {
    store
        .insert_role(&RoleRecord::new(name, category_id))
        .await
        .expect("insert role")
}

/// Current membership starting `days` ago.
pub async fn join<S: RoleStore>(store: &mut S, role_id: i64, user_id: i64, days: i64, leader: bool) -> i64 {
    let mut m = NewMembership::starting(role_id, user_id, days_ago(days));
    m.leader = leader;
    store.insert_membership(&m).await.expect("insert membership")
}

/// Connect to PostgreSQL when `DATABASE_URL` is set and run migrations.
/// Returns `None` so callers can skip when no database is available.
pub async fn setup_pg_db() -> Option<PgPool> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) if !url.is_empty() => url,
        _ => {
            eprintln!("DATABASE_URL not set, skipping PostgreSQL test");
            return None;
        }
    };
    let pool = PgPool::connect(&url).await.expect("connect to DATABASE_URL");
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
    Some(pool)
}

// ============================================================================
// HTTP SETUP
// ============================================================================

#[derive(Deserialize)]
struct LoginParams {
    user_id: i64,
    organization_id: i64,
    #[serde(default)]
    permissions: String,
}

/// Stores identity in the session the way the login flow would.
async fn test_login(session: Session, params: web::Query<LoginParams>) -> HttpResponse {
    session.insert("user_id", params.user_id).expect("session user_id");
    session.insert("organization_id", params.organization_id).expect("session organization_id");
    session.insert("permissions", params.permissions.clone()).expect("session permissions");
    HttpResponse::Ok().finish()
}

/// App factory shared by handler tests: session cookies, `/test/login`, and all routes.
pub fn test_app(
    db: MemoryRoleDb,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl actix_web::body::MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let session_mw = SessionMiddleware::builder(CookieSessionStore::default(), Key::from(&[7u8; 64]))
        .cookie_secure(false)
        .build();
    App::new()
        .wrap(session_mw)
        .app_data(web::Data::new(db))
        .route("/test/login", web::get().to(test_login))
        .configure(handlers::configure::<MemoryRoleDb>)
}

/// Path for `/test/login` with the given identity.
pub fn login_uri(user_id: i64, organization_id: i64, permissions: &str) -> String {
    format!("/test/login?user_id={user_id}&organization_id={organization_id}&permissions={permissions}")
}

/// Extract the session cookie from a login response.
pub fn session_cookie<B>(resp: &actix_web::dev::ServiceResponse<B>) -> Cookie<'static> {
    resp.response()
        .cookies()
        .find(|c| c.name() == "id")
        .map(|c| c.into_owned())
        .expect("session cookie set")
}
