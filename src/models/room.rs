use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Entity kinds a room can be scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomScope {
    Application,
    Project,
    Task,
    Note,
    Document,
    User,
}

impl RoomScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoomScope::Application => "application",
            RoomScope::Project => "project",
            RoomScope::Task => "task",
            RoomScope::Note => "note",
            RoomScope::Document => "document",
            RoomScope::User => "user",
        }
    }
}

impl FromStr for RoomScope {
    type Err = RoomIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "application" => Ok(RoomScope::Application),
            "project" => Ok(RoomScope::Project),
            "task" => Ok(RoomScope::Task),
            "note" => Ok(RoomScope::Note),
            "document" => Ok(RoomScope::Document),
            "user" => Ok(RoomScope::User),
            other => Err(RoomIdError::UnknownScope(other.to_string())),
        }
    }
}

/// A broadcast room key in the wire format `"<scope>:<entity-id>"`.
///
/// Rooms only exist while they have members; this type is just the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId {
    scope: RoomScope,
    entity_id: String,
}

impl RoomId {
    pub fn new(scope: RoomScope, entity_id: impl Into<String>) -> Self {
        Self {
            scope,
            entity_id: entity_id.into(),
        }
    }

    /// Parse a raw `"<scope>:<entity-id>"` key.
    pub fn parse(raw: &str) -> Result<Self, RoomIdError> {
        let (scope_part, id_part) = raw
            .split_once(':')
            .ok_or_else(|| RoomIdError::MissingSeparator(raw.to_string()))?;
        if id_part.is_empty() {
            return Err(RoomIdError::EmptyEntityId(raw.to_string()));
        }
        let scope = RoomScope::from_str(scope_part)?;
        Ok(Self {
            scope,
            entity_id: id_part.to_string(),
        })
    }

    /// The personal room of a user, used for direct-to-user delivery.
    pub fn user_room(user_id: &str) -> Self {
        Self::new(RoomScope::User, user_id)
    }

    pub fn scope(&self) -> RoomScope {
        self.scope
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// A `user:<id>` room is only joinable by the user it belongs to.
    pub fn is_joinable_by(&self, user_id: &str) -> bool {
        self.scope != RoomScope::User || self.entity_id == user_id
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.scope.as_str(), self.entity_id)
    }
}

impl TryFrom<String> for RoomId {
    type Error = RoomIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RoomId::parse(&value)
    }
}

impl From<RoomId> for String {
    fn from(value: RoomId) -> Self {
        value.to_string()
    }
}

#[derive(Debug)]
pub enum RoomIdError {
    MissingSeparator(String),
    EmptyEntityId(String),
    UnknownScope(String),
}

impl fmt::Display for RoomIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomIdError::MissingSeparator(raw) => {
                write!(f, "Room id '{}' is missing the ':' separator", raw)
            }
            RoomIdError::EmptyEntityId(raw) => {
                write!(f, "Room id '{}' has an empty entity id", raw)
            }
            RoomIdError::UnknownScope(scope) => write!(f, "Unknown room scope '{}'", scope),
        }
    }
}

impl std::error::Error for RoomIdError {}
