use actix_web::{web, HttpResponse};

use crate::auth::session::RequestContext;
use crate::errors::AppError;
use crate::models::role::{self, RoleForm};
use crate::store::{RoleDatabase, RoleStore};

/// POST /roles: create a role and its dependencies in one transaction.
pub async fn create<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    form: web::Json<RoleForm>,
) -> Result<HttpResponse, AppError> {
    let mut store = db.begin().await?;
    let saved = role::save_role(&mut store, &ctx, None, &form).await?;
    store.commit().await?;

    Ok(HttpResponse::Created().json(saved))
}

/// POST /roles/{id}: edit a role and reconcile its child roles.
pub async fn update<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    path: web::Path<i64>,
    form: web::Json<RoleForm>,
) -> Result<HttpResponse, AppError> {
    let role_id = path.into_inner();

    let mut store = db.begin().await?;
    let saved = role::save_role(&mut store, &ctx, Some(role_id), &form).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(saved))
}

/// POST /roles/{id}/delete
pub async fn delete<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let role_id = path.into_inner();

    let mut store = db.begin().await?;
    role::delete_role(&mut store, &ctx, role_id).await?;
    store.commit().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "deleted": role_id })))
}
