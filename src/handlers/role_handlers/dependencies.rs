use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::auth::session::RequestContext;
use crate::errors::AppError;
use crate::models::dependency;
use crate::models::role;
use crate::store::{RoleDatabase, RoleStore};

/// GET /roles/{id}/dependencies: parent and child roles of a role.
pub async fn show<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    path: web::Path<i64>,
) -> Result<HttpResponse, AppError> {
    let role_id = path.into_inner();

    let mut store = db.begin().await?;
    role::find_editable(&mut store, &ctx, role_id).await?;
    let parents = dependency::parent_roles(&mut store, role_id).await?;
    let children = dependency::child_roles(&mut store, role_id).await?;
    store.rollback().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": role_id,
        "parents": parents,
        "children": children,
    })))
}

#[derive(Debug, Deserialize)]
pub struct VacancyQuery {
    pub capacity: i32,
}

/// GET /roles/{id}/vacancies?capacity=N: would the role fit into N places?
pub async fn vacancies<D: RoleDatabase>(
    db: web::Data<D>,
    ctx: RequestContext,
    path: web::Path<i64>,
    query: web::Query<VacancyQuery>,
) -> Result<HttpResponse, AppError> {
    let role_id = path.into_inner();

    let mut store = db.begin().await?;
    role::find_editable(&mut store, &ctx, role_id).await?;
    let vacancies = dependency::count_vacancies(&mut store, ctx.today, role_id, query.capacity).await?;
    store.rollback().await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "id": role_id,
        "capacity": query.capacity,
        "vacancies": vacancies,
        "accepted": !vacancies.is_violated(),
    })))
}
