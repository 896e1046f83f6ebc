use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Payload is not a JSON object")]
    NotAnObject,

    #[error("Unrecognized control type: {0}")]
    UnknownType(String),

    #[error("Malformed {kind} payload: {reason}")]
    Malformed { kind: String, reason: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Display name must not be empty")]
    EmptyDisplayName,

    #[error("Peer id must not be empty")]
    EmptyPeerId,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum JoinLinkError {
    #[error("No `connect` parameter in share link")]
    MissingParameter,

    #[error("Share link is not valid percent-encoding")]
    InvalidEncoding,

    #[error("Share link payload is not valid: {0}")]
    InvalidPayload(String),
}
