use crate::api_client::{ClientError, ok_body};
use crate::{CreatureId, OwnerKey, SubjectId, requests, responses};
use reqwest::Url;
use serde::Serialize;

/// Served at `creatures/stats`, so it can never address a single creature.
const STATS_SEGMENT: &str = "stats";

/// A client for the game API, which is hosted separately from the session
/// gateway.
#[derive(Clone)]
pub struct GameClient {
    pub address: String,
    pub inner_client: reqwest::Client,
}

impl GameClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            inner_client: reqwest::Client::new(),
        }
    }

    /// Join `segments` onto the base address, percent-encoding each one so
    /// an id can never step into a sibling route.
    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.address).map_err(|e| {
            ClientError::InvalidRequest(format!("{}: {e}", self.address))
        })?;
        if let Some(bad) = segments
            .iter()
            .find(|segment| matches!(**segment, "" | "." | ".."))
        {
            return Err(ClientError::InvalidRequest(format!(
                "{bad:?} is not a valid path segment"
            )));
        }
        url.path_segments_mut()
            .map_err(|()| {
                ClientError::InvalidRequest(format!(
                    "{} cannot be a base address",
                    self.address
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get(
        &self,
        segments: &[&str],
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.url(segments)?;
        Ok(self.inner_client.get(url).query(query).send().await?)
    }

    async fn post(
        &self,
        segments: &[&str],
        body: &impl Serialize,
    ) -> Result<reqwest::Response, ClientError> {
        let url = self.url(segments)?;
        Ok(self.inner_client.post(url).json(body).send().await?)
    }
}

/// Methods on the game API
impl GameClient {
    /// One page of the creatures owned by an avatar. Pages start at 1.
    #[tracing::instrument(skip(self))]
    pub async fn list_creatures(
        &self,
        owner_key: &OwnerKey,
        page: u32,
        limit: u32,
    ) -> Result<responses::CreatureList, ClientError> {
        let query = [
            ("owner_key", owner_key.0.clone()),
            ("page", page.to_string()),
            ("limit", limit.to_string()),
        ];
        let response = self.get(&["creatures"], &query).await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn creature(
        &self,
        creature_id: &CreatureId,
    ) -> Result<responses::Creature, ClientError> {
        if creature_id.0 == STATS_SEGMENT {
            return Err(ClientError::InvalidRequest(format!(
                "{STATS_SEGMENT:?} is not a creature id"
            )));
        }
        let response =
            self.get(&["creatures", creature_id.0.as_str()], &[]).await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn creature_stats(
        &self,
        owner_key: &OwnerKey,
    ) -> Result<responses::CreatureStats, ClientError> {
        let query = [("owner_key", owner_key.0.clone())];
        let response = self.get(&["creatures", STATS_SEGMENT], &query).await?;
        ok_body(response).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn user_status(
        &self,
        subject_id: &SubjectId,
    ) -> Result<responses::UserStatus, ClientError> {
        let response = self
            .get(&["users", subject_id.0.as_str(), "status"], &[])
            .await?;
        ok_body(response).await
    }

    pub async fn game_config(
        &self,
    ) -> Result<responses::GameConfig, ClientError> {
        let response = self.get(&["config"], &[]).await?;
        ok_body(response).await
    }

    /// Request a fresh in-world verification code for a subject.
    #[tracing::instrument(skip(self))]
    pub async fn verification_code(
        &self,
        subject_id: &SubjectId,
    ) -> Result<responses::VerificationCode, ClientError> {
        let body = requests::RequestVerificationCode {
            subject_id: subject_id.clone(),
        };
        let response = self.post(&["verification", "code"], &body).await?;
        ok_body(response).await
    }
}
