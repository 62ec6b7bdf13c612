/// Persisted records of the messaging subsystem.
///
/// These are the typed rows the backend hands out. Anything coming off the
/// wire or out of storage is parsed into one of these before business logic
/// touches it.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ChatError;

/// Which side of the marketplace a user is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Business,
    Courier,
}

impl Role {
    /// Turkish label shown next to a counterpart's name.
    pub fn label(self) -> &'static str {
        match self {
            Role::Business => "İşletme",
            Role::Courier => "Kurye",
        }
    }

    pub fn counterpart(self) -> Role {
        match self {
            Role::Business => Role::Courier,
            Role::Courier => Role::Business,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Business => write!(f, "business"),
            Role::Courier => write!(f, "courier"),
        }
    }
}

impl FromStr for Role {
    type Err = ChatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "business" | "isletme" | "işletme" => Ok(Role::Business),
            "courier" | "kurye" => Ok(Role::Courier),
            other => Err(ChatError::InvalidInput(format!("unknown role: {}", other))),
        }
    }
}

/// The signed-in user every operation acts on behalf of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: Uuid,
    pub role: Role,
}

impl UserSession {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }
}

/// One business paired with one courier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub business_id: Uuid,
    pub courier_id: Uuid,
    pub created_at: DateTime<Utc>,
    /// Bumped whenever a message is appended.
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_by_business: bool,
    #[serde(default)]
    pub deleted_by_courier: bool,
}

impl Conversation {
    pub fn new(business_id: Uuid, courier_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            business_id,
            courier_id,
            created_at: now,
            updated_at: now,
            deleted_by_business: false,
            deleted_by_courier: false,
        }
    }

    /// The participant holding `role` in this conversation.
    pub fn participant(&self, role: Role) -> Uuid {
        match role {
            Role::Business => self.business_id,
            Role::Courier => self.courier_id,
        }
    }

    pub fn is_participant(&self, session: &UserSession) -> bool {
        self.participant(session.role) == session.user_id
    }

    /// The other side, seen from `session`.
    pub fn counterpart_id(&self, session: &UserSession) -> Uuid {
        self.participant(session.role.counterpart())
    }

    pub fn is_hidden_for(&self, role: Role) -> bool {
        match role {
            Role::Business => self.deleted_by_business,
            Role::Courier => self.deleted_by_courier,
        }
    }

    pub fn set_hidden(&mut self, role: Role, hidden: bool) {
        match role {
            Role::Business => self.deleted_by_business = hidden,
            Role::Courier => self.deleted_by_courier = hidden,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// Chronological sort key. The id breaks ties between equal timestamps.
    pub fn order_key(&self) -> (DateTime<Utc>, Uuid) {
        (self.created_at, self.id)
    }
}

/// Insert payload for a message; the backend assigns id and timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewMessage {
    pub conversation_id: Uuid,
    pub sender_id: Uuid,
    pub sender_role: Role,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusinessProfile {
    pub user_id: Uuid,
    pub business_name: String,
    pub logo_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CourierProfile {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}
