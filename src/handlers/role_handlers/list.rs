use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::session::RequestContext;
use crate::errors::AppError;
use crate::models::role::{self, RoleType};
use crate::store::{RoleDatabase, RoleStore};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default, rename = "type")]
    pub role_type: RoleType,
}

/// GET /roles?type=active|inactive|events: role overview with occupant counts.
pub async fn list<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    query: web::Query<ListQuery>,
) -> Result<HttpResponse, AppError> {
    let mut store = db.begin().await?;
    let roles = role::list_roles(&mut store, &ctx, query.role_type).await?;
    store.rollback().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "count": roles.len(),
        "roles": roles,
    })))
}
