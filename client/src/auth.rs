//! Identity provider adapter.
//!
//! Sign-in, registration and password reset go straight to the hosted
//! identity provider; the gateway only ever sees the resulting tokens.

use async_trait::async_trait;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Incorrect email or password.")]
    InvalidCredentials,
    #[error("Please confirm your account before signing in.")]
    UserNotConfirmed,
    #[error("Invalid verification code. Please try again.")]
    CodeMismatch,
    #[error("This code has expired. Please request a new one.")]
    ExpiredCode,
    #[error("An account with this email already exists.")]
    UsernameExists,
    #[error("{0}")]
    InvalidPassword(String),
    #[error("Too many attempts. Please wait a moment and try again.")]
    LimitExceeded,
    /// Any other provider error, with the provider's message.
    #[error("{0}")]
    Provider(String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
}

/// The three tokens a successful sign-in yields.
#[derive(Debug)]
pub struct AuthTokens {
    pub access_token: SecretString,
    pub id_token: SecretString,
    pub refresh_token: SecretString,
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug)]
pub struct NewAccount {
    pub email: String,
    pub password: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignUpResult {
    pub user_confirmed: bool,
    pub user_sub: Option<String>,
    /// Where the confirmation code was sent, as reported by the provider.
    pub code_destination: Option<String>,
}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthTokens, AuthError>;

    async fn sign_up(
        &self,
        account: &NewAccount,
    ) -> Result<SignUpResult, AuthError>;

    async fn confirm_sign_up(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), AuthError>;

    async fn resend_confirmation_code(
        &self,
        email: &str,
    ) -> Result<(), AuthError>;

    async fn forgot_password(&self, email: &str) -> Result<(), AuthError>;

    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), AuthError>;
}

#[derive(Debug, Clone)]
pub struct IdentityConfig {
    pub region: String,
    pub user_pool_client_id: String,
    /// Overrides the regional endpoint, e.g. for a local emulator.
    pub endpoint: Option<String>,
}

impl IdentityConfig {
    pub fn endpoint(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => {
                format!("https://cognito-idp.{}.amazonaws.com", self.region)
            }
        }
    }
}

const TARGET_PREFIX: &str = "AWSCognitoIdentityProviderService";
const CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// Speaks the user-pool JSON API directly. Built once from config and
/// shared by reference.
pub struct CognitoIdentityProvider {
    endpoint: String,
    client_id: String,
    inner_client: reqwest::Client,
}

impl CognitoIdentityProvider {
    pub fn new(config: &IdentityConfig) -> Self {
        Self::with_client(config, reqwest::Client::new())
    }

    pub fn with_client(
        config: &IdentityConfig,
        inner_client: reqwest::Client,
    ) -> Self {
        Self {
            endpoint: config.endpoint(),
            client_id: config.user_pool_client_id.clone(),
            inner_client,
        }
    }

    async fn call<T: DeserializeOwned>(
        &self,
        action: &str,
        body: Value,
    ) -> Result<T, AuthError> {
        let response = self
            .inner_client
            .post(&self.endpoint)
            .header("X-Amz-Target", format!("{TARGET_PREFIX}.{action}"))
            .header(reqwest::header::CONTENT_TYPE, CONTENT_TYPE)
            .body(body.to_string())
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            let error = provider_error(status, &text);
            tracing::debug!(action, %status, error = %error, "provider error");
            return Err(error);
        }
        // empty bodies come back from the confirmation actions
        let text = if text.trim().is_empty() { "{}" } else { &text };
        serde_json::from_str(text).map_err(|e| {
            AuthError::Provider(format!("Unexpected response: {e}"))
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InitiateAuthResponse {
    authentication_result: Option<AuthenticationResult>,
    challenge_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct AuthenticationResult {
    access_token: String,
    id_token: String,
    refresh_token: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct SignUpResponse {
    #[serde(default)]
    user_confirmed: bool,
    user_sub: Option<String>,
    code_delivery_details: Option<CodeDeliveryDetails>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CodeDeliveryDetails {
    destination: Option<String>,
}

#[derive(Deserialize)]
struct Ignored {}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    #[tracing::instrument(skip_all, fields(email = %credentials.email))]
    async fn sign_in(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthTokens, AuthError> {
        let body = json!({
            "AuthFlow": "USER_PASSWORD_AUTH",
            "ClientId": self.client_id,
            "AuthParameters": {
                "USERNAME": credentials.email,
                "PASSWORD": credentials.password.expose_secret(),
            },
        });
        let response: InitiateAuthResponse =
            self.call("InitiateAuth", body).await?;

        let Some(result) = response.authentication_result else {
            let challenge = response.challenge_name.unwrap_or_default();
            return Err(AuthError::Provider(format!(
                "Unsupported sign-in challenge: {challenge}"
            )));
        };
        let Some(refresh_token) = result.refresh_token else {
            return Err(AuthError::Provider(
                "Sign-in did not return a refresh token".into(),
            ));
        };
        Ok(AuthTokens {
            access_token: result.access_token.into(),
            id_token: result.id_token.into(),
            refresh_token: refresh_token.into(),
        })
    }

    #[tracing::instrument(skip_all, fields(email = %account.email))]
    async fn sign_up(
        &self,
        account: &NewAccount,
    ) -> Result<SignUpResult, AuthError> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": account.email,
            "Password": account.password.expose_secret(),
            "UserAttributes": [{ "Name": "email", "Value": account.email }],
        });
        let response: SignUpResponse = self.call("SignUp", body).await?;
        Ok(SignUpResult {
            user_confirmed: response.user_confirmed,
            user_sub: response.user_sub,
            code_destination: response
                .code_delivery_details
                .and_then(|details| details.destination),
        })
    }

    #[tracing::instrument(skip(self, code))]
    async fn confirm_sign_up(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), AuthError> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": email,
            "ConfirmationCode": code,
        });
        self.call::<Ignored>("ConfirmSignUp", body).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn resend_confirmation_code(
        &self,
        email: &str,
    ) -> Result<(), AuthError> {
        let body = json!({ "ClientId": self.client_id, "Username": email });
        self.call::<Ignored>("ResendConfirmationCode", body).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    async fn forgot_password(&self, email: &str) -> Result<(), AuthError> {
        let body = json!({ "ClientId": self.client_id, "Username": email });
        self.call::<Ignored>("ForgotPassword", body).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, code, new_password))]
    async fn confirm_forgot_password(
        &self,
        email: &str,
        code: &str,
        new_password: &SecretString,
    ) -> Result<(), AuthError> {
        let body = json!({
            "ClientId": self.client_id,
            "Username": email,
            "ConfirmationCode": code,
            "Password": new_password.expose_secret(),
        });
        self.call::<Ignored>("ConfirmForgotPassword", body).await?;
        Ok(())
    }
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(rename = "__type", default)]
    kind: String,
    #[serde(alias = "Message", default)]
    message: Option<String>,
}

/// Map the provider's `__type` error code onto an [`AuthError`].
fn provider_error(status: StatusCode, text: &str) -> AuthError {
    let Ok(body) = serde_json::from_str::<ErrorBody>(text) else {
        return AuthError::Provider(format!(
            "Identity provider error ({status})"
        ));
    };
    // codes sometimes arrive namespaced: "com.amazonaws...#CodeMismatch..."
    let kind = body.kind.rsplit('#').next().unwrap_or_default();
    let message = body.message.filter(|m| !m.trim().is_empty());
    match kind {
        "NotAuthorizedException" | "UserNotFoundException" => {
            AuthError::InvalidCredentials
        }
        "UserNotConfirmedException" => AuthError::UserNotConfirmed,
        "CodeMismatchException" => AuthError::CodeMismatch,
        "ExpiredCodeException" => AuthError::ExpiredCode,
        "UsernameExistsException" => AuthError::UsernameExists,
        "InvalidPasswordException" => {
            AuthError::InvalidPassword(message.unwrap_or_else(|| {
                "Password does not meet requirements".into()
            }))
        }
        "LimitExceededException" | "TooManyRequestsException" => {
            AuthError::LimitExceeded
        }
        _ => AuthError::Provider(message.unwrap_or_else(|| {
            format!("Identity provider error ({status})")
        })),
    }
}
