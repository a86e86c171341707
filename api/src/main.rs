use api::{
    Config, build,
    telemetry::{get_subscriber, init_subscriber},
};

/// Session gateway for the portal.
///
/// Reads its settings from the process environment, after merging in a
/// `.env` file when one exists.
///
/// - `IP_ADDRESS`, `PORT`: bind address (required)
/// - `ALLOWED_ORIGINS`: `*` or a comma-separated origin list
/// - `APP_ENV=production`: session cookies get the Secure flag
/// - `PROTECTED_PREFIXES`: paths that redirect to login without a session
/// - `LOGIN_PATH`: redirect target, `/login` unless set
/// - `STATIC_DIR`: built front end served at `/`
///
/// ```text
/// IP_ADDRESS=0.0.0.0 PORT=8000 APP_ENV=production \
///     ALLOWED_ORIGINS=https://portal.example.com cargo run -p api
/// ```
#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    init_subscriber(get_subscriber("info"))?;

    let mut config = Config::from_env()?;

    let server = build(&mut config)?;
    tracing::info!(port = config.port, "session gateway listening");
    server.await?;
    Ok(())
}
