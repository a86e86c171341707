//! Form-level authentication flows: validate, call the identity provider,
//! and hand the resulting tokens to the session gateway.

use payloads::{APIClient, ClientError, requests};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;

use crate::auth::{
    AuthError, Credentials, IdentityProvider, NewAccount, SignUpResult,
};

pub const PASSWORD_MIN_LEN: usize = 8;
pub const DEFAULT_REDIRECT: &str = "/dashboard";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    Required(&'static str),
    #[error("Password must be at least {PASSWORD_MIN_LEN} characters")]
    PasswordTooShort,
    #[error("Passwords do not match")]
    PasswordMismatch,
}

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    /// The gateway refused or could not be reached.
    #[error(transparent)]
    Session(#[from] ClientError),
}

#[derive(Debug)]
pub struct LoginForm {
    pub email: String,
    pub password: SecretString,
    pub remember_me: bool,
    /// Where the route guard sent the user from, if anywhere.
    pub redirect: Option<String>,
}

#[derive(Debug)]
pub struct RegisterForm {
    pub email: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

#[derive(Debug)]
pub struct ResetPasswordForm {
    pub email: String,
    pub code: String,
    pub password: SecretString,
    pub confirm_password: SecretString,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    SignedIn { redirect: String },
    /// The account exists but was never confirmed; show the code prompt.
    ConfirmationRequired { email: String },
}

pub struct AuthFlows {
    identity: Arc<dyn IdentityProvider>,
    gateway: APIClient,
}

impl AuthFlows {
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        gateway: APIClient,
    ) -> Self {
        Self { identity, gateway }
    }

    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn login(
        &self,
        form: &LoginForm,
    ) -> Result<LoginOutcome, FlowError> {
        let email = required("Email", &form.email)?;
        required("Password", form.password.expose_secret())?;

        let credentials = Credentials {
            email: email.to_string(),
            password: form.password.expose_secret().into(),
        };
        let tokens = match self.identity.sign_in(&credentials).await {
            Ok(tokens) => tokens,
            Err(AuthError::UserNotConfirmed) => {
                tracing::info!("account needs confirmation");
                return Ok(LoginOutcome::ConfirmationRequired {
                    email: email.to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let details = requests::CreateSession {
            access_token: tokens.access_token.expose_secret().to_string(),
            id_token: tokens.id_token.expose_secret().to_string(),
            refresh_token: tokens.refresh_token.expose_secret().to_string(),
            remember_me: form.remember_me,
        };
        self.gateway.create_session(&details).await?;

        Ok(LoginOutcome::SignedIn {
            redirect: sanitize_redirect(form.redirect.as_deref()),
        })
    }

    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn register(
        &self,
        form: &RegisterForm,
    ) -> Result<SignUpResult, FlowError> {
        let email = required("Email", &form.email)?;
        new_password(&form.password, &form.confirm_password)?;

        let account = NewAccount {
            email: email.to_string(),
            password: form.password.expose_secret().into(),
        };
        Ok(self.identity.sign_up(&account).await?)
    }

    #[tracing::instrument(skip(self, code))]
    pub async fn confirm_registration(
        &self,
        email: &str,
        code: &str,
    ) -> Result<(), FlowError> {
        let email = required("Email", email)?;
        let code = required("Confirmation code", code)?;
        Ok(self.identity.confirm_sign_up(email, code).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn resend_confirmation(
        &self,
        email: &str,
    ) -> Result<(), FlowError> {
        let email = required("Email", email)?;
        Ok(self.identity.resend_confirmation_code(email).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<(), FlowError> {
        let email = required("Email", email)?;
        Ok(self.identity.forgot_password(email).await?)
    }

    #[tracing::instrument(skip_all, fields(email = %form.email))]
    pub async fn reset_password(
        &self,
        form: &ResetPasswordForm,
    ) -> Result<(), FlowError> {
        let email = required("Email", &form.email)?;
        let code = required("Reset code", &form.code)?;
        new_password(&form.password, &form.confirm_password)?;
        Ok(self
            .identity
            .confirm_forgot_password(email, code, &form.password)
            .await?)
    }

    pub async fn logout(&self) -> Result<(), FlowError> {
        Ok(self.gateway.destroy_session().await?)
    }
}

fn required<'a>(
    field: &'static str,
    value: &'a str,
) -> Result<&'a str, ValidationError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(ValidationError::Required(field));
    }
    Ok(value)
}

fn new_password(
    password: &SecretString,
    confirm: &SecretString,
) -> Result<(), ValidationError> {
    let password = password.expose_secret();
    if password.is_empty() {
        return Err(ValidationError::Required("Password"));
    }
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(ValidationError::PasswordTooShort);
    }
    if password != confirm.expose_secret() {
        return Err(ValidationError::PasswordMismatch);
    }
    Ok(())
}

/// Only same-site absolute paths are followed after sign-in.
pub fn sanitize_redirect(redirect: Option<&str>) -> String {
    match redirect.map(str::trim) {
        Some(path)
            if path.starts_with('/')
                && !path.starts_with("//")
                && !path.starts_with("/\\") =>
        {
            path.to_string()
        }
        _ => DEFAULT_REDIRECT.to_string(),
    }
}
