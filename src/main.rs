use actix_session::{SessionMiddleware, storage::CookieSessionStore};
use actix_web::{App, HttpServer, cookie::Key, middleware, web};
use sqlx::PgPool;

use rolekeeper::{config::AppConfig, db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = AppConfig::from_env().map_err(std::io::Error::other)?;

    let pool = db::init_pool(&config).await.map_err(std::io::Error::other)?;
    db::run_migrations(&pool).await.map_err(std::io::Error::other)?;

    // Session encryption key. A random key means sessions are lost on restart.
    let secret_key = match &config.session_key {
        Some(val) => {
            log::info!("Using SESSION_KEY from environment");
            Key::from(val.as_bytes())
        }
        None => Key::generate(),
    };

    log::info!("Starting server at http://{}", config.bind_addr);

    HttpServer::new(move || {
        let session_mw = SessionMiddleware::builder(
            CookieSessionStore::default(),
            secret_key.clone(),
        )
        .cookie_secure(false)
        .cookie_http_only(true)
        .build();

        App::new()
            .wrap(session_mw)
            .wrap(middleware::Logger::default())
            .app_data(web::Data::new(pool.clone()))
            .configure(handlers::configure::<PgPool>)
            .default_service(web::to(|| async {
                actix_web::HttpResponse::NotFound().json(serde_json::json!({ "error": "Not found" }))
            }))
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await
}
