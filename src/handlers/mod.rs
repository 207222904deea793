pub mod health;
pub mod role_handlers;

use actix_web::web;

use crate::auth::middleware::require_json_content_type;
use crate::store::RoleDatabase;

/// Register all routes for a database backend.
pub fn configure<D: RoleDatabase>(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health::check::<D>));
    cfg.service(
        web::scope("/roles")
            .wrap(actix_web::middleware::from_fn(require_json_content_type))
            .route("", web::get().to(role_handlers::list::list::<D>))
            .route("", web::post().to(role_handlers::crud::create::<D>))
            .route("/{id}", web::post().to(role_handlers::crud::update::<D>))
            .route("/{id}/delete", web::post().to(role_handlers::crud::delete::<D>))
            .route("/{id}/activate", web::post().to(role_handlers::status::activate::<D>))
            .route("/{id}/deactivate", web::post().to(role_handlers::status::deactivate::<D>))
            .route("/{id}/dependencies", web::get().to(role_handlers::dependencies::show::<D>))
            .route("/{id}/vacancies", web::get().to(role_handlers::dependencies::vacancies::<D>)),
    );
}
