pub mod guard;
pub mod routes;
pub mod telemetry;

use actix_cors::Cors;
use actix_web::dev::Server;
use actix_web::middleware::from_fn;
use actix_web::{App, HttpServer, web};
use anyhow::Context;
use std::net::TcpListener;
use std::path::PathBuf;

use crate::guard::RouteGuard;
use crate::routes::session::CookiePolicy;

/// Bind the listener and assemble the server without running it.
///
/// `config.port` is updated with the port actually bound, which differs
/// from the requested one when that was 0.
pub fn build(config: &mut Config) -> std::io::Result<Server> {
    let cookie_policy = web::Data::new(CookiePolicy {
        secure: config.production,
    });
    let route_guard = web::Data::new(RouteGuard::new(
        config.protected_prefixes.clone(),
        config.login_path.clone(),
    ));
    let allowed_origins = config.allowed_origins.clone();
    let static_dir = config.static_dir.clone();

    let listener = TcpListener::bind((config.ip.as_str(), config.port))?;
    config.port = listener.local_addr()?.port();
    let server = HttpServer::new(move || {
        let cors = cors_policy(&allowed_origins);
        let mut app = App::new()
            .wrap(from_fn(guard::require_session))
            .wrap(cors)
            .configure(routes::session_services)
            .app_data(cookie_policy.clone())
            .app_data(route_guard.clone());

        // The front end is served last so the session routes take priority
        if let Some(dir) = &static_dir {
            app = app.service(
                actix_files::Files::new("/", dir).index_file("index.html"),
            );
        }
        app
    })
    .listen(listener)?
    .run();
    Ok(server)
}

pub struct Config {
    pub ip: String,
    /// 0 binds an OS-assigned port
    pub port: u16,
    /// CORS origins; `"*"` allows any
    pub allowed_origins: Vec<String>,
    /// Marks session cookies as Secure
    pub production: bool,
    /// Path prefixes that redirect to the login page without a session
    pub protected_prefixes: Vec<String>,
    pub login_path: String,
    /// Directory with the built front end, if this server should host it
    pub static_dir: Option<PathBuf>,
}

pub const DEFAULT_PROTECTED_PREFIXES: &[&str] = &[
    "/dashboard",
    "/creatures",
    "/mailbox",
    "/inventory",
    "/vorest",
    "/verify-required",
];

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        use std::env::var;

        let allowed_origins = split_list(
            &var("ALLOWED_ORIGINS").unwrap_or_else(|_| "*".to_string()),
        );
        let protected_prefixes = match var("PROTECTED_PREFIXES") {
            Ok(prefixes) => split_list(&prefixes),
            Err(_) => DEFAULT_PROTECTED_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
        };

        Ok(Config {
            ip: var("IP_ADDRESS").context("IP_ADDRESS must be set")?,
            port: var("PORT")
                .context("PORT must be set")?
                .parse()
                .context("PORT must be a port number")?,
            allowed_origins,
            production: var("APP_ENV")
                .map(|env| env.eq_ignore_ascii_case("production"))
                .unwrap_or(false),
            protected_prefixes,
            login_path: var("LOGIN_PATH").unwrap_or_else(|_| "/login".into()),
            static_dir: var("STATIC_DIR").ok().map(PathBuf::from),
        })
    }
}

/// Session cookies ride along on cross-origin calls, so credentials are
/// always allowed. `*` opens every origin.
fn cors_policy(allowed_origins: &[String]) -> Cors {
    let base = Cors::default()
        .allow_any_method()
        .allow_any_header()
        .supports_credentials();
    if allowed_origins.iter().any(|origin| origin == "*") {
        return base.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(base, |cors, origin| cors.allowed_origin(origin))
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
