use chat_protocol::{Role, WireMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Final,
    InFlight,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
}

impl Message {
    /// User messages are always created final.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::User,
            content: content.into(),
            status: MessageStatus::Final,
        }
    }

    #[must_use]
    pub fn in_flight(content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            role: Role::Assistant,
            content: content.into(),
            status: MessageStatus::InFlight,
        }
    }

    #[must_use]
    pub fn is_final(&self) -> bool {
        self.status == MessageStatus::Final
    }

    #[must_use]
    pub fn to_wire(&self) -> WireMessage {
        WireMessage::new(self.id.clone(), self.role, self.content.clone())
    }

    /// `ROLE: content` line used by transcript export.
    #[must_use]
    pub fn export_line(&self) -> String {
        format!("{}: {}", self.role.as_str().to_uppercase(), self.content)
    }
}

fn new_message_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
