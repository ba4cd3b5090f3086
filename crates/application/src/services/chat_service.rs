use std::sync::Arc;

use domain::{DomainError, Message, Room, RoomId, Username};

use crate::{
    error::ApplicationError, message_store::MessageStore, room_registry::RoomRegistry,
};

#[derive(Debug, Clone)]
pub struct CreateRoomRequest {
    pub name: String,
    pub creator: Username,
    pub participants: Vec<String>,
}

pub struct ChatServiceDependencies {
    pub rooms: Arc<RoomRegistry>,
    pub messages: Arc<MessageStore>,
}

pub struct ChatService {
    deps: ChatServiceDependencies,
}

impl ChatService {
    pub fn new(deps: ChatServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn create_room(&self, request: CreateRoomRequest) -> Result<Room, ApplicationError> {
        let room = self
            .deps
            .rooms
            .create_room(&request.name, &request.creator, &request.participants)
            .await?;
        Ok(room)
    }

    pub async fn list_rooms(&self, username: &Username) -> Vec<Room> {
        self.deps.rooms.list_rooms_for(username).await
    }

    /// 只有房间参与者可以读取历史消息
    pub async fn list_messages(
        &self,
        username: &Username,
        room_id: RoomId,
    ) -> Result<Vec<Message>, ApplicationError> {
        let room = self
            .deps
            .rooms
            .get(room_id)
            .await
            .ok_or(DomainError::UnknownRoom(room_id))?;
        if !room.has_participant(username) {
            return Err(DomainError::Forbidden.into());
        }
        Ok(self.deps.messages.list_for(room_id).await)
    }
}
