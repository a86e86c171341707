//! Redirects visitors without a session away from protected pages.

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header;
use actix_web::middleware::Next;
use actix_web::{HttpResponse, web};
use reqwest::Url;

use crate::routes::session::ID_TOKEN_COOKIE;

/// The set of protected path prefixes and where to send visitors who hit
/// one without a session.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    protected_prefixes: Vec<String>,
    login_path: String,
}

impl RouteGuard {
    pub fn new(protected_prefixes: Vec<String>, login_path: String) -> Self {
        let protected_prefixes = protected_prefixes
            .into_iter()
            .map(|prefix| prefix.trim_end_matches('/').to_string())
            .filter(|prefix| !prefix.is_empty())
            .collect();
        Self {
            protected_prefixes,
            login_path,
        }
    }

    /// Prefixes match whole path segments, so `/vorest` covers
    /// `/vorest/map` but not `/vorestry`. The path is resolved first, so
    /// `//vorest` and `/x/../vorest` are covered too.
    pub fn is_protected(&self, path: &str) -> bool {
        let path = resolve_segments(path);
        self.protected_prefixes.iter().any(|prefix| {
            path.strip_prefix(prefix.as_str())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    /// Login location carrying the original path and query as `redirect`.
    pub fn login_location(&self, original: &str) -> String {
        // only used to percent-encode the query; the host is discarded
        let mut url = match Url::parse("http://gateway.invalid")
            .and_then(|base| base.join(&self.login_path))
        {
            Ok(url) => url,
            Err(_) => return self.login_path.clone(),
        };
        url.query_pairs_mut().append_pair("redirect", original);
        match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        }
    }
}

/// The path as the file server walks it: empty and `.` segments dropped,
/// `..` popping the previous one.
fn resolve_segments(path: &str) -> String {
    let mut segments = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            segment => segments.push(segment),
        }
    }
    format!("/{}", segments.join("/"))
}

/// Middleware for `actix_web::middleware::from_fn`.
///
/// Checks the router's view of the path, which actix has already
/// percent-decoded (`/%64ashboard` is `/dashboard` there), not the raw
/// request line.
pub async fn require_session(
    request: ServiceRequest,
    next: Next<impl MessageBody + 'static>,
) -> Result<ServiceResponse<impl MessageBody>, actix_web::Error> {
    let redirect = request
        .app_data::<web::Data<RouteGuard>>()
        .filter(|guard| {
            guard.is_protected(request.match_info().unprocessed())
        })
        .filter(|_| request.cookie(ID_TOKEN_COOKIE).is_none())
        .map(|guard| {
            let original = request
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str())
                .unwrap_or_else(|| request.path());
            guard.login_location(original)
        });

    match redirect {
        Some(location) => {
            tracing::debug!(path = request.path(), "no session, redirecting");
            let response = HttpResponse::Found()
                .insert_header((header::LOCATION, location))
                .finish();
            Ok(request.into_response(response).map_into_right_body())
        }
        None => next
            .call(request)
            .await
            .map(ServiceResponse::map_into_left_body),
    }
}
