use actix_web::{HttpResponse, ResponseError};
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    Db(sqlx::Error),
    Migrate(sqlx::migrate::MigrateError),
    Session(String),
    Validation(String),
    Conflict(String),
    /// The requested capacity is below the number of current non-leader occupants.
    Capacity { role_id: i64, vacancies: i64 },
    PermissionDenied(String),
    Unauthenticated,
    NotFound,
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Db(e) => write!(f, "Database error: {e}"),
            AppError::Migrate(e) => write!(f, "Migration error: {e}"),
            AppError::Session(e) => write!(f, "Session error: {e}"),
            AppError::Validation(msg) => write!(f, "Validation error: {msg}"),
            AppError::Conflict(msg) => write!(f, "Conflict: {msg}"),
            AppError::Capacity { role_id, vacancies } => write!(
                f,
                "Role {role_id} has more members than the new capacity allows ({vacancies} vacancies)"
            ),
            AppError::PermissionDenied(code) => write!(f, "Permission denied: {code}"),
            AppError::Unauthenticated => write!(f, "Not logged in"),
            AppError::NotFound => write!(f, "Not found"),
        }
    }
}

impl std::error::Error for AppError {}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let body = serde_json::json!({ "error": self.to_string() });
        match self {
            AppError::NotFound => HttpResponse::NotFound().json(body),
            AppError::Validation(_) => HttpResponse::BadRequest().json(body),
            AppError::Conflict(_) | AppError::Capacity { .. } => HttpResponse::Conflict().json(body),
            AppError::PermissionDenied(_) => HttpResponse::Forbidden().json(body),
            AppError::Unauthenticated => HttpResponse::Unauthorized().json(body),
            _ => {
                log::error!("{self}");
                HttpResponse::InternalServerError()
                    .json(serde_json::json!({ "error": "Internal Server Error" }))
            }
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Db(e)
    }
}

impl From<sqlx::migrate::MigrateError> for AppError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        AppError::Migrate(e)
    }
}
