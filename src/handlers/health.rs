//! Health check endpoint for load balancers and container probes.

use actix_web::{web, HttpResponse};
use serde::Serialize;

use crate::store::{RoleDatabase, RoleStore};

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// GET /health: "healthy" when a unit of work can be opened, "degraded" otherwise.
pub async fn check<D: RoleDatabase>(db: web::Data<D>) -> HttpResponse {
    let db_ok = match db.begin().await {
        Ok(store) => store.rollback().await.is_ok(),
        Err(e) => {
            log::warn!("Health check could not reach the database: {e}");
            false
        }
    };

    HttpResponse::Ok().json(HealthResponse {
        status: if db_ok { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
    })
}
