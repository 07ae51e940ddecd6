use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{error, info};

use super::{Credential, CredentialIssuer};
use crate::error::CredentialError;

/// Room permissions granted to the participant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoGrant {
    pub room: String,
    pub room_join: bool,
    pub can_publish: bool,
    pub can_subscribe: bool,
    pub can_publish_data: bool,
}

impl VideoGrant {
    fn full_access(room: &str) -> Self {
        Self {
            room: room.to_string(),
            room_join: true,
            can_publish: true,
            can_subscribe: true,
            can_publish_data: true,
        }
    }
}

/// JWT claims understood by the media server
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub video: VideoGrant,
    /// Participant identity
    pub sub: String,
    /// API key
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Issues HS256 tokens signed with a locally held API secret
pub struct LocalTokenIssuer {
    api_key: Option<String>,
    api_secret: Option<String>,
    ttl: Duration,
}

impl LocalTokenIssuer {
    pub fn new(api_key: Option<String>, api_secret: Option<String>, ttl: Duration) -> Self {
        Self {
            api_key,
            api_secret,
            ttl,
        }
    }

    fn signing_config(&self) -> Result<(&str, &str), CredentialError> {
        match (self.api_key.as_deref(), self.api_secret.as_deref()) {
            (Some(key), Some(secret)) if !key.is_empty() && !secret.is_empty() => {
                Ok((key, secret))
            }
            _ => Err(CredentialError::Misconfigured(
                "missing API key or secret".into(),
            )),
        }
    }
}

#[async_trait]
impl CredentialIssuer for LocalTokenIssuer {
    async fn issue(&self, room: &str, participant: &str) -> Result<Credential, CredentialError> {
        let (api_key, api_secret) = self.signing_config().map_err(|e| {
            error!("Refusing to issue credential: {}", e);
            e
        })?;

        if room.trim().is_empty() || participant.trim().is_empty() {
            return Err(CredentialError::InvalidParams(
                "room and participant are required".into(),
            ));
        }

        let issued_at = Utc::now();
        let ttl = ChronoDuration::from_std(self.ttl)
            .map_err(|e| CredentialError::InvalidParams(format!("invalid ttl: {}", e)))?;
        let expires_at = issued_at + ttl;

        let claims = Claims {
            video: VideoGrant::full_access(room),
            sub: participant.to_string(),
            iss: api_key.to_string(),
            iat: issued_at.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(api_secret.as_bytes()),
        )
        .map_err(|e| {
            error!("Error generating token: {}", e);
            CredentialError::Signing("failed to generate token".into())
        })?;

        info!("Issued credential for {} in room {}", participant, room);

        Ok(Credential {
            token,
            room: room.to_string(),
            identity: participant.to_string(),
            expires_at,
        })
    }
}
