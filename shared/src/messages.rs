use serde::{Deserialize, Serialize};

use crate::classification::{Classification, Mount, Profession};
use crate::vector::{Vector2, Vector3};

/// One inbound relay envelope, routed by its `Type` discriminator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Type")]
pub enum LiveMessage {
    UpsertCharacterMovement(CharacterMovement),
    UpdateCharacterState(CharacterState),
    UpdateCharacterKeepAlive(CharacterKeepAlive),
    DeleteCharacterData(CharacterDeletion),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterMovement {
    #[serde(rename = "AccountName", alias = "accountId", alias = "AccountId")]
    pub account_name: String,
    #[serde(rename = "CharacterName", alias = "characterName")]
    pub character_name: String,
    #[serde(rename = "MapPosition", alias = "mapPosition")]
    pub map_position: Vector2,
    #[serde(rename = "CharacterForward", alias = "forwardVector")]
    pub character_forward: Vector3,
    #[serde(rename = "MapId", alias = "mapId", default)]
    pub map_id: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterState {
    #[serde(rename = "AccountName", alias = "accountId", alias = "AccountId")]
    pub account_name: String,
    #[serde(rename = "CharacterName", alias = "characterName")]
    pub character_name: String,
    #[serde(rename = "IsCommander", alias = "isCommander", default)]
    pub is_commander: bool,
    #[serde(rename = "Mount", alias = "mount", default)]
    pub mount: Mount,
    #[serde(rename = "Profession", alias = "profession", default)]
    pub profession: Profession,
    #[serde(rename = "Specialisation", alias = "specialisation", default)]
    pub specialisation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterKeepAlive {
    #[serde(rename = "AccountName", alias = "accountId", alias = "AccountId")]
    pub account_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterDeletion {
    #[serde(rename = "AccountName", alias = "accountId", alias = "AccountId")]
    pub account_name: String,
}

impl CharacterState {
    pub fn classification(&self) -> Classification {
        Classification {
            profession: self.profession,
            specialisation: self.specialisation,
            mount: self.mount,
            is_commander: self.is_commander,
        }
    }
}

impl LiveMessage {
    pub fn account_name(&self) -> &str {
        match self {
            Self::UpsertCharacterMovement(m) => &m.account_name,
            Self::UpdateCharacterState(s) => &s.account_name,
            Self::UpdateCharacterKeepAlive(k) => &k.account_name,
            Self::DeleteCharacterData(d) => &d.account_name,
        }
    }

    /// The wire discriminator of this message.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UpsertCharacterMovement(_) => "UpsertCharacterMovement",
            Self::UpdateCharacterState(_) => "UpdateCharacterState",
            Self::UpdateCharacterKeepAlive(_) => "UpdateCharacterKeepAlive",
            Self::DeleteCharacterData(_) => "DeleteCharacterData",
        }
    }
}

/// Why an inbound payload could not be turned into a [`LiveMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// Not JSON, or missing the `Type` discriminator.
    Malformed(String),
    /// A well-formed envelope whose `Type` this client does not handle.
    UnknownType(String),
    /// A known `Type` with missing or mistyped fields.
    InvalidFields { kind: String, reason: String },
}

pub fn decode(payload: &[u8]) -> Result<LiveMessage, serde_json::Error> {
    serde_json::from_slice(payload)
}

/// Decode a payload, classifying failures for logging.
pub fn decode_or_reject(payload: &[u8]) -> Result<LiveMessage, Rejection> {
    let error = match decode(payload) {
        Ok(message) => return Ok(message),
        Err(e) => e,
    };

    let kind = serde_json::from_slice::<serde_json::Value>(payload)
        .ok()
        .and_then(|value| value.get("Type")?.as_str().map(str::to_owned));

    match kind {
        None => Err(Rejection::Malformed(error.to_string())),
        Some(kind) if KNOWN_TYPES.contains(&kind.as_str()) => Err(Rejection::InvalidFields {
            kind,
            reason: error.to_string(),
        }),
        Some(kind) => Err(Rejection::UnknownType(kind)),
    }
}

const KNOWN_TYPES: [&str; 4] = [
    "UpsertCharacterMovement",
    "UpdateCharacterState",
    "UpdateCharacterKeepAlive",
    "DeleteCharacterData",
];
