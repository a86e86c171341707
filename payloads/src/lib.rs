pub mod api_client;
pub mod game_client;
pub mod requests;
pub mod responses;

pub use api_client::{APIClient, ClientError};
pub use game_client::GameClient;

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The stable user identifier carried in an identity token's `sub` claim.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SubjectId(pub String);

/// An in-world avatar identifier that scopes game data to one player.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct OwnerKey(pub String);

#[derive(
    Debug, Clone, PartialEq, Eq, Hash, Display, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct CreatureId(pub String);

/// Status value the game API reports once a player has verified in-world.
pub const VERIFIED_STATUS: &str = "verified";

/// Page size used when accumulating every page of a list endpoint.
pub const FETCH_ALL_PAGE_SIZE: u32 = 100;
