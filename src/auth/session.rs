use std::future::{Ready, ready};

use actix_session::{Session, SessionExt};
use actix_web::{FromRequest, HttpRequest, dev::Payload};
use chrono::{Local, NaiveDate};

use crate::errors::AppError;

/// Permission code required for editing roles and their dependencies.
pub const MANAGE_ROLES: &str = "roles.manage";

/// Wrapper around permission codes with a `has()` method.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Permissions(pub Vec<String>);

impl Permissions {
    pub fn has(&self, code: &str) -> bool {
        self.0.iter().any(|p| p == code)
    }

    pub fn from_csv(csv: &str) -> Self {
        let codes = csv
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        Permissions(codes)
    }
}

/// Who is acting, for which organization, and on which calendar day.
///
/// Built once per request and passed explicitly into every role operation.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: i64,
    pub organization_id: i64,
    pub permissions: Permissions,
    pub today: NaiveDate,
}

impl RequestContext {
    pub fn new(user_id: i64, organization_id: i64, permissions: Permissions, today: NaiveDate) -> Self {
        RequestContext { user_id, organization_id, permissions, today }
    }

    /// Check permission; returns Err(AppError) if denied.
    pub fn require_permission(&self, code: &str) -> Result<(), AppError> {
        if self.permissions.has(code) {
            Ok(())
        } else {
            Err(AppError::PermissionDenied(code.to_string()))
        }
    }

    /// Read the identity the login flow stored in the session.
    pub fn from_session(session: &Session, today: NaiveDate) -> Result<Self, AppError> {
        let user_id = session
            .get::<i64>("user_id")
            .map_err(|e| AppError::Session(format!("Failed to read user_id: {e}")))?
            .ok_or(AppError::Unauthenticated)?;
        let organization_id = session
            .get::<i64>("organization_id")
            .map_err(|e| AppError::Session(format!("Failed to read organization_id: {e}")))?
            .ok_or(AppError::Unauthenticated)?;
        let permissions = session
            .get::<String>("permissions")
            .map_err(|e| AppError::Session(format!("Failed to read permissions: {e}")))?
            .map(|csv| Permissions::from_csv(&csv))
            .unwrap_or_default();
        Ok(RequestContext::new(user_id, organization_id, permissions, today))
    }
}

impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let session = req.get_session();
        ready(RequestContext::from_session(&session, Local::now().date_naive()))
    }
}
