//! Session credentials
//!
//! A fresh credential is requested before every connect attempt. The issuer
//! is an external collaborator; [`LocalTokenIssuer`] signs tokens in-process
//! for deployments that hold the API secret locally.

mod issuer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CredentialError;

pub use issuer::{LocalTokenIssuer, VideoGrant};

/// Signed bearer token scoped to one room and one participant
#[derive(Clone, Serialize)]
pub struct Credential {
    #[serde(skip)]
    pub token: String,
    pub room: String,
    pub identity: String,
    pub expires_at: DateTime<Utc>,
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("token", &"<redacted>")
            .field("room", &self.room)
            .field("identity", &self.identity)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl PartialEq for Credential {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl Credential {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Mints credentials for a (room, participant) pair
///
/// Must fail closed: no credential is produced without valid signing
/// configuration.
#[async_trait]
pub trait CredentialIssuer: Send + Sync {
    async fn issue(&self, room: &str, participant: &str) -> Result<Credential, CredentialError>;
}

/// Participant identity for one connect attempt, e.g. `user-3f9a1c2e`
pub fn generate_identity(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &id[..8])
}
