use serde::{Deserialize, Serialize};

use crate::value_objects::{EncryptedContent, MessageId, RoomId, Timestamp, Username};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Text,
    Image,
    File,
}

/// 已持久化的消息，创建后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: MessageId,
    pub room_id: RoomId,
    pub sender: Username,
    pub encrypted_content: EncryptedContent,
    pub timestamp: Timestamp,
    #[serde(rename = "type")]
    pub message_type: MessageType,
}

impl Message {
    pub fn new(
        id: MessageId,
        room_id: RoomId,
        sender: Username,
        encrypted_content: EncryptedContent,
        message_type: MessageType,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            room_id,
            sender,
            encrypted_content,
            timestamp,
            message_type,
        }
    }
}
