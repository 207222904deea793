use actix_web::{
    Error, HttpResponse,
    body::MessageBody,
    dev::{ServiceRequest, ServiceResponse},
    http::{Method, header},
    middleware::Next,
};

/// Whether the request declares a JSON body (`application/json`, any parameters).
fn declares_json(req: &ServiceRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|essence| essence.trim().eq_ignore_ascii_case("application/json"))
}

/// Role mutations only accept JSON bodies.
///
/// A cross-site form post cannot carry `application/json` together with the
/// session cookie, so this check doubles as the CSRF guard. Reads pass through.
pub async fn require_json_content_type(
    req: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, Error> {
    let is_read = [Method::GET, Method::HEAD, Method::OPTIONS].contains(req.method());

    if !is_read && !declares_json(&req) {
        log::debug!("Rejected {} {} without a JSON content type", req.method(), req.path());
        let response = HttpResponse::UnsupportedMediaType().json(serde_json::json!({
            "error": "Role changes must be sent as application/json"
        }));
        return Ok(req.into_response(response).map_into_right_body());
    }

    next.call(req).await.map(|res| res.map_into_left_body())
}
