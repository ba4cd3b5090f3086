use std::collections::HashMap;
use std::sync::Arc;

use domain::{
    DomainError, EncryptedContent, Message, MessageId, MessageType, RoomId, Username,
};
use tokio::sync::RwLock;

use crate::{clock::Clock, room_registry::RoomRegistry};

/// 每个房间一份只追加的消息日志。
///
/// 日志顺序就是 `append` 被观察到的顺序；PresenceHub 在持有房间锁的情况下
/// 追加并广播，因此广播顺序与日志顺序一致。
pub struct MessageStore {
    rooms: Arc<RoomRegistry>,
    clock: Arc<dyn Clock>,
    logs: RwLock<HashMap<RoomId, Vec<Message>>>,
}

impl MessageStore {
    pub fn new(rooms: Arc<RoomRegistry>, clock: Arc<dyn Clock>) -> Self {
        Self {
            rooms,
            clock,
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn append(
        &self,
        room_id: RoomId,
        sender: Username,
        encrypted_content: EncryptedContent,
        message_type: MessageType,
    ) -> Result<Message, DomainError> {
        if self.rooms.get(room_id).await.is_none() {
            return Err(DomainError::UnknownRoom(room_id));
        }

        let message = Message::new(
            MessageId::generate(),
            room_id,
            sender,
            encrypted_content,
            message_type,
            self.clock.now(),
        );

        self.logs
            .write()
            .await
            .entry(room_id)
            .or_default()
            .push(message.clone());

        tracing::debug!(room_id = %room_id, message_id = %message.id, "message appended");
        Ok(message)
    }

    /// 按追加顺序返回完整日志；还没有消息的房间返回空列表
    pub async fn list_for(&self, room_id: RoomId) -> Vec<Message> {
        self.logs
            .read()
            .await
            .get(&room_id)
            .cloned()
            .unwrap_or_default()
    }
}
