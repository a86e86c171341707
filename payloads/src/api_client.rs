use crate::{requests, responses};
use reqwest::StatusCode;
use serde::Serialize;

type ReqwestResult = Result<reqwest::Response, reqwest::Error>;

/// An API client for interfacing with the session gateway.
#[derive(Clone)]
pub struct APIClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

impl APIClient {
    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.address.trim_end_matches('/'))
    }

    /// Browsers only attach the session cookies when asked to.
    async fn send(&self, request: reqwest::RequestBuilder) -> ReqwestResult {
        #[cfg(target_arch = "wasm32")]
        let request = request.fetch_credentials_include();
        request.send().await
    }

    async fn post(&self, path: &str, body: &impl Serialize) -> ReqwestResult {
        self.send(self.inner_client.post(self.url(path)).json(body))
            .await
    }

    async fn post_empty(&self, path: &str) -> ReqwestResult {
        self.send(self.inner_client.post(self.url(path))).await
    }

    async fn get(&self, path: &str) -> ReqwestResult {
        self.send(self.inner_client.get(self.url(path))).await
    }
}

/// Methods on the session gateway
impl APIClient {
    pub async fn health_check(&self) -> Result<(), ClientError> {
        let response = self.get("health_check").await?;
        ok_empty(response).await
    }

    /// Exchange identity-provider tokens for session cookies.
    pub async fn create_session(
        &self,
        details: &requests::CreateSession,
    ) -> Result<(), ClientError> {
        let response = self.post("session-create", details).await?;
        ok_empty(response).await
    }

    /// Look up the identity behind the current session cookies.
    pub async fn session_self(
        &self,
    ) -> Result<responses::SessionUser, ClientError> {
        let response = self.get("session-self").await?;
        ok_body(response).await
    }

    /// Check if the session cookies identify a user.
    pub async fn session_check(&self) -> Result<bool, ClientError> {
        let response = self.get("session-self").await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Ok(false);
        }
        ok_empty(response).await.map(|()| true)
    }

    pub async fn destroy_session(&self) -> Result<(), ClientError> {
        let response = self.post_empty("session-destroy").await?;
        ok_empty(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// An unhandled API error to display, containing response text.
    #[error("{1}")]
    APIError(StatusCode, String),
    #[error("Network error. Please check your connection.")]
    Network(#[from] reqwest::Error),
    /// The request could not be addressed, e.g. a malformed base address or
    /// an id that cannot stand as a single path segment.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::APIError(status, _) => Some(*status),
            Self::Network(e) => e.status(),
            Self::InvalidRequest(_) => None,
        }
    }
}

/// Deserialize a successful response body, returning a ClientError if not.
pub async fn ok_body<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(response.json::<T>().await?)
}

/// Check that an empty response is OK, returning a ClientError if not.
pub async fn ok_empty(response: reqwest::Response) -> Result<(), ClientError> {
    if !response.status().is_success() {
        return Err(ClientError::APIError(
            response.status(),
            response.text().await?,
        ));
    }
    Ok(())
}
