use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Role of the party acting on an order, as supplied by the auth context.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActorRole {
    Customer,
    Restaurant,
    Driver,
    Admin,
    System,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::Customer => "CUSTOMER",
            ActorRole::Restaurant => "RESTAURANT",
            ActorRole::Driver => "DRIVER",
            ActorRole::Admin => "ADMIN",
            ActorRole::System => "SYSTEM",
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActorRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CUSTOMER" => Ok(ActorRole::Customer),
            "RESTAURANT" => Ok(ActorRole::Restaurant),
            "DRIVER" => Ok(ActorRole::Driver),
            "ADMIN" => Ok(ActorRole::Admin),
            "SYSTEM" => Ok(ActorRole::System),
            other => Err(format!("unknown actor role: {other}")),
        }
    }
}

/// The authenticated party behind a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Actor {
    pub id: Uuid,
    pub role: ActorRole,
}

impl Actor {
    pub fn new(id: Uuid, role: ActorRole) -> Self {
        Self { id, role }
    }

    /// Background jobs act without a user identity.
    pub fn system() -> Self {
        Self { id: Uuid::nil(), role: ActorRole::System }
    }
}
