pub mod mock;

use api::{Config, DEFAULT_PROTECTED_PREFIXES, telemetry};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use payloads::requests;
use reqwest::StatusCode;
use serde_json::json;
use tracing_log::LogTracer;
use tracing_subscriber::util::SubscriberInitExt;

pub struct TestApp {
    #[allow(unused)]
    pub port: u16,
    pub client: payloads::APIClient,
}

impl TestApp {
    /// Issue a raw GET, for pages outside the typed client (guarded routes).
    pub async fn get(&self, path: &str) -> anyhow::Result<reqwest::Response> {
        let url = format!("{}{path}", self.client.address);
        Ok(self.client.inner_client.get(url).send().await?)
    }

    /// Store session cookies for a user, as a successful login would.
    pub async fn sign_in_as(
        &self,
        sub: &str,
        remember_me: bool,
    ) -> anyhow::Result<()> {
        self.client
            .create_session(&session_tokens(sub, remember_me))
            .await?;
        Ok(())
    }
}

/// Gateway settings for tests: local only, any origin, default guards.
pub fn test_config(port: u16) -> Config {
    Config {
        ip: "127.0.0.1".into(),
        port,
        allowed_origins: vec!["*".into()],
        production: false,
        protected_prefixes: DEFAULT_PROTECTED_PREFIXES
            .iter()
            .map(|prefix| prefix.to_string())
            .collect(),
        login_path: "/login".into(),
        static_dir: None,
    }
}

/// Only errors are printed; repeated installs across tests are ignored.
fn init_test_tracing() {
    let _ = LogTracer::init();
    let _ = telemetry::get_subscriber("error").try_init();
}

/// Launch the gateway on `port` (0 for any free port).
pub async fn spawn_app_on_port(port: u16) -> TestApp {
    spawn_app_with(test_config(port)).await
}

/// Launch the gateway with custom settings, e.g. production cookies or a
/// static front end.
pub async fn spawn_app_with(mut config: Config) -> TestApp {
    init_test_tracing();

    let server = api::build(&mut config).expect("gateway failed to bind");
    tokio::spawn(server);

    // redirects stay visible so the route guard can be asserted on
    let inner_client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .cookie_store(true)
        .build()
        .expect("test http client");

    TestApp {
        port: config.port,
        client: payloads::APIClient {
            address: format!("http://127.0.0.1:{}", config.port),
            inner_client,
        },
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_on_port(0).await
}

/// Panics unless `result` is an API error with the `expected` status.
pub fn assert_status_code<T>(
    result: Result<T, payloads::ClientError>,
    expected: StatusCode,
) {
    match result {
        Err(payloads::ClientError::APIError(code, body)) => {
            assert_eq!(code, expected, "response body: {body}")
        }
        Err(other) => panic!("expected {expected}, got {other:?}"),
        Ok(_) => panic!("expected {expected}, got a success"),
    }
}

/// An unsigned identity token carrying `sub` and optionally `email`.
pub fn id_token(sub: &str, email: Option<&str>) -> String {
    let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"none","typ":"JWT"}"#);
    let mut claims = json!({ "sub": sub, "token_use": "id" });
    if let Some(email) = email {
        claims["email"] = json!(email);
    }
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.signature")
}

pub fn session_tokens(sub: &str, remember_me: bool) -> requests::CreateSession {
    requests::CreateSession {
        access_token: format!("access-{sub}"),
        id_token: id_token(sub, Some(&format!("{sub}@example.com"))),
        refresh_token: format!("refresh-{sub}"),
        remember_me,
    }
}
