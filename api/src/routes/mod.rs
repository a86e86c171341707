pub mod session;

use actix_web::{
    HttpResponse, Responder, ResponseError, body::BoxBody, get, web,
};

use crate::telemetry;

/// Registers the gateway routes at the root, leaving unmatched paths to
/// whatever is registered after them.
pub fn session_services(cfg: &mut web::ServiceConfig) {
    cfg.service(health_check)
        .service(session::session_create)
        .service(session::session_self)
        .service(session::session_destroy);
}

#[get("/health_check")]
pub async fn health_check() -> impl Responder {
    HttpResponse::Ok().body("healthy")
}

#[derive(Debug, thiserror::Error)]
pub enum APIError {
    #[error("Authentication failed")]
    AuthError(#[source] anyhow::Error),
    #[error("Bad request")]
    BadRequest(#[source] anyhow::Error),
    #[error("Something went wrong")]
    UnexpectedError(#[from] anyhow::Error),
}

impl ResponseError for APIError {
    fn error_response(&self) -> HttpResponse<BoxBody> {
        match self {
            Self::AuthError(e) => {
                HttpResponse::Unauthorized().body(format!("{self}: {e}"))
            }
            Self::BadRequest(e) => {
                HttpResponse::BadRequest().body(format!("{self}: {e}"))
            }
            Self::UnexpectedError(e) => {
                telemetry::log_error(e);
                HttpResponse::InternalServerError().body(self.to_string())
            }
        }
    }
}
