use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::value_objects::{RoomId, Timestamp, Username};

/// 聊天室。参与者集合在创建之后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub participants: BTreeSet<Username>,
    pub created_by: Username,
    pub created_at: Timestamp,
}

impl Room {
    /// 创建房间，创建者总是会被并入参与者集合。
    pub fn new(
        id: RoomId,
        name: impl Into<String>,
        created_by: Username,
        participants: impl IntoIterator<Item = Username>,
        created_at: Timestamp,
    ) -> Result<Self, DomainError> {
        let name = Self::validate_name(name.into())?;
        let mut participants: BTreeSet<Username> = participants.into_iter().collect();
        participants.insert(created_by.clone());

        Ok(Self {
            id,
            name,
            participants,
            created_by,
            created_at,
        })
    }

    pub fn has_participant(&self, username: &Username) -> bool {
        self.participants.contains(username)
    }

    fn validate_name(name: String) -> Result<String, DomainError> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(DomainError::invalid_argument("room_name", "cannot be empty"));
        }
        if trimmed.chars().count() > 60 {
            return Err(DomainError::invalid_argument("room_name", "too long"));
        }
        Ok(trimmed.to_owned())
    }
}
