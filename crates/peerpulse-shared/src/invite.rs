use serde::{Deserialize, Serialize};

use crate::constants::JOIN_QUERY_PARAM;
use crate::error::JoinLinkError;
use crate::types::PeerId;

/// Payload of a shareable join link: who to connect to and what to call them
/// until their handshake arrives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinLink {
    pub peer_id: PeerId,
    pub username: String,
}

impl JoinLink {
    pub fn new(peer_id: PeerId, username: impl Into<String>) -> Self {
        Self {
            peer_id,
            username: username.into(),
        }
    }

    /// Encode as `<origin>?connect=<percent-encoded JSON>`.
    pub fn to_url(&self, origin: &str) -> Result<String, JoinLinkError> {
        let json = serde_json::to_string(self)
            .map_err(|e| JoinLinkError::InvalidPayload(e.to_string()))?;
        Ok(format!(
            "{}?{}={}",
            origin.trim_end_matches('/'),
            JOIN_QUERY_PARAM,
            urlencoding::encode(&json)
        ))
    }

    /// Parse either a full share URL or just the parameter value
    /// (percent-encoded or raw JSON).
    pub fn parse(input: &str) -> Result<Self, JoinLinkError> {
        let input = input.trim();
        let encoded = match input.split_once('?') {
            Some((_, query)) => query_param(query, JOIN_QUERY_PARAM)
                .ok_or(JoinLinkError::MissingParameter)?,
            None => input,
        };

        let json = if encoded.starts_with('{') {
            encoded.to_string()
        } else {
            urlencoding::decode(encoded)
                .map_err(|_| JoinLinkError::InvalidEncoding)?
                .into_owned()
        };

        let link: JoinLink = serde_json::from_str(&json)
            .map_err(|e| JoinLinkError::InvalidPayload(e.to_string()))?;
        if link.peer_id.as_str().is_empty() {
            return Err(JoinLinkError::InvalidPayload("empty peerId".into()));
        }
        Ok(link)
    }
}

fn query_param<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    let query = query.split('#').next().unwrap_or(query);
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v)
}
