use anyhow::Context;
use payloads::{APIClient, GameClient};

use crate::auth::{CognitoIdentityProvider, IdentityConfig};

/// Where the client finds its three backends.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub game_api_url: String,
    /// Session gateway, usually the origin the front end is served from.
    pub gateway_url: String,
    pub identity: IdentityConfig,
}

impl ClientConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        use std::env::var;

        Ok(ClientConfig {
            game_api_url: var("GAME_API_URL")
                .context("GAME_API_URL must be set")?,
            gateway_url: var("GATEWAY_URL")
                .context("GATEWAY_URL must be set")?,
            identity: IdentityConfig {
                region: var("IDENTITY_REGION")
                    .context("IDENTITY_REGION must be set")?,
                user_pool_client_id: var("IDENTITY_CLIENT_ID")
                    .context("IDENTITY_CLIENT_ID must be set")?,
                endpoint: var("IDENTITY_ENDPOINT")
                    .ok()
                    .filter(|endpoint| !endpoint.trim().is_empty()),
            },
        })
    }

    pub fn game_client(&self) -> GameClient {
        GameClient::new(self.game_api_url.as_str())
    }

    /// Gateway client that keeps the session cookies between requests.
    pub fn gateway_client(&self) -> anyhow::Result<APIClient> {
        let inner_client = reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .context("Failed to build gateway client")?;
        Ok(APIClient {
            address: self.gateway_url.trim_end_matches('/').to_string(),
            inner_client,
        })
    }

    pub fn identity_provider(&self) -> CognitoIdentityProvider {
        CognitoIdentityProvider::new(&self.identity)
    }
}
