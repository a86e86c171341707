use crate::SubjectId;
use serde::{Deserialize, Serialize};

/// Tokens handed to the session gateway after a successful sign in.
///
/// Missing tokens deserialize as empty strings so the gateway can answer
/// with a 400 instead of a deserialization error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSession {
    #[serde(default, alias = "accessToken")]
    pub access_token: String,
    #[serde(default, alias = "idToken")]
    pub id_token: String,
    #[serde(default, alias = "refreshToken")]
    pub refresh_token: String,
    #[serde(default, alias = "rememberMe")]
    pub remember_me: bool,
}

impl CreateSession {
    /// Names of the tokens that are absent or blank.
    pub fn missing_tokens(&self) -> Vec<&'static str> {
        [
            ("access_token", &self.access_token),
            ("id_token", &self.id_token),
            ("refresh_token", &self.refresh_token),
        ]
        .into_iter()
        .filter(|(_, token)| token.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestVerificationCode {
    pub subject_id: SubjectId,
}
