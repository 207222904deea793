use actix_web::{web, HttpResponse};

use crate::auth::session::RequestContext;
use crate::errors::AppError;
use crate::models::role;
use crate::store::{RoleDatabase, RoleStore};

async fn set_active<D: RoleDatabase>(
    db: &D,
    ctx: &RequestContext,
    role_id: i64,
    active: bool,
) -> Result<HttpResponse, AppError> {
    let mut store = db.begin().await?;
    role::set_role_active(&mut store, ctx, role_id, active).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "id": role_id, "valid": active })))
}

/// POST /roles/{id}/activate
pub async fn activate<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    set_active(db.get_ref(), &ctx, path.into_inner(), true).await
}

/// POST /roles/{id}/deactivate
pub async fn deactivate<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    set_active(db.get_ref(), &ctx, path.into_inner(), false).await
}
