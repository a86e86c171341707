use actix_web::cookie::{Cookie, SameSite, time::Duration};
use actix_web::{HttpRequest, HttpResponse, get, post, web};
use anyhow::{Context, anyhow};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;

use payloads::{SubjectId, requests, responses};

use super::APIError;

pub const ACCESS_TOKEN_COOKIE: &str = "session-access-token";
pub const ID_TOKEN_COOKIE: &str = "session-id-token";
pub const REFRESH_TOKEN_COOKIE: &str = "session-refresh-token";

const ACCESS_TOKEN_TTL: Duration = Duration::hours(1);
const ID_TOKEN_TTL: Duration = Duration::hours(1);
const REFRESH_TOKEN_TTL: Duration = Duration::days(1);
const REMEMBERED_REFRESH_TOKEN_TTL: Duration = Duration::days(30);

/// Attributes shared by every session cookie.
#[derive(Debug, Clone, Copy)]
pub struct CookiePolicy {
    /// Only send cookies over https; enabled in production.
    pub secure: bool,
}

impl CookiePolicy {
    fn cookie(
        &self,
        name: &'static str,
        value: String,
        max_age: Duration,
    ) -> Cookie<'static> {
        Cookie::build(name, value)
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(max_age)
            .finish()
    }
}

#[tracing::instrument(
    skip(details, policy),
    fields(remember_me = tracing::field::Empty)
)]
#[post("/session-create")]
pub async fn session_create(
    details: web::Json<requests::CreateSession>,
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, APIError> {
    let details = details.into_inner();
    tracing::Span::current().record("remember_me", details.remember_me);

    let missing = details.missing_tokens();
    if !missing.is_empty() {
        return Err(APIError::BadRequest(anyhow!(
            "Missing tokens: {}",
            missing.join(", ")
        )));
    }

    let refresh_ttl = if details.remember_me {
        REMEMBERED_REFRESH_TOKEN_TTL
    } else {
        REFRESH_TOKEN_TTL
    };

    Ok(HttpResponse::Ok()
        .cookie(policy.cookie(
            ACCESS_TOKEN_COOKIE,
            details.access_token,
            ACCESS_TOKEN_TTL,
        ))
        .cookie(policy.cookie(ID_TOKEN_COOKIE, details.id_token, ID_TOKEN_TTL))
        .cookie(policy.cookie(
            REFRESH_TOKEN_COOKIE,
            details.refresh_token,
            refresh_ttl,
        ))
        .finish())
}

#[tracing::instrument(skip(request), fields(subject_id=tracing::field::Empty))]
#[get("/session-self")]
pub async fn session_self(
    request: HttpRequest,
) -> Result<HttpResponse, APIError> {
    let cookie = request
        .cookie(ID_TOKEN_COOKIE)
        .ok_or_else(|| APIError::AuthError(anyhow!("No session")))?;
    let user = decode_id_token(cookie.value()).map_err(APIError::AuthError)?;
    tracing::Span::current()
        .record("subject_id", tracing::field::display(&user.sub));
    Ok(HttpResponse::Ok().json(user))
}

#[tracing::instrument(skip(policy))]
#[post("/session-destroy")]
pub async fn session_destroy(
    policy: web::Data<CookiePolicy>,
) -> Result<HttpResponse, APIError> {
    let mut response = HttpResponse::Ok();
    for name in [ACCESS_TOKEN_COOKIE, ID_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE] {
        response.cookie(policy.cookie(name, String::new(), Duration::ZERO));
    }
    Ok(response.finish())
}

#[derive(Deserialize)]
struct IdTokenClaims {
    sub: Option<String>,
    email: Option<String>,
}

/// Read the subject and email out of an id token's payload segment.
///
/// The signature is not checked here; the identity provider issued the
/// token and the game API validates it on its own requests.
pub fn decode_id_token(token: &str) -> anyhow::Result<responses::SessionUser> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("Malformed id token"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .context("Id token payload is not base64url")?;
    let claims: IdTokenClaims = serde_json::from_slice(&bytes)
        .context("Id token payload is not JSON")?;
    let sub = claims
        .sub
        .filter(|sub| !sub.is_empty())
        .ok_or_else(|| anyhow!("Id token has no subject"))?;
    Ok(responses::SessionUser {
        sub: SubjectId(sub),
        email: claims.email,
    })
}
