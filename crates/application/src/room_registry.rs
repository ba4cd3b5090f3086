use std::collections::HashMap;
use std::sync::Arc;

use domain::{DomainError, Room, RoomId, Username};
use tokio::sync::RwLock;

use crate::{clock::Clock, user_directory::UserDirectory};

#[derive(Default)]
struct RoomTable {
    /// 按创建顺序保存
    ordered: Vec<Room>,
    index: HashMap<RoomId, usize>,
}

/// 聊天室及其参与者集合
pub struct RoomRegistry {
    users: Arc<UserDirectory>,
    clock: Arc<dyn Clock>,
    rooms: RwLock<RoomTable>,
}

impl RoomRegistry {
    pub fn new(users: Arc<UserDirectory>, clock: Arc<dyn Clock>) -> Self {
        Self {
            users,
            clock,
            rooms: RwLock::new(RoomTable::default()),
        }
    }

    /// 创建房间。参与者按请求顺序逐个校验，遇到第一个非法或未注册的名字立即失败，
    /// 不会留下半成品房间。
    pub async fn create_room(
        &self,
        name: &str,
        creator: &Username,
        requested: &[String],
    ) -> Result<Room, DomainError> {
        if !self.users.contains(creator).await {
            return Err(DomainError::UnknownParticipant(creator.to_string()));
        }
        let mut participants = Vec::with_capacity(requested.len());
        for raw in requested {
            // 连合法用户名都不是的参与者，按原样报告
            let participant = Username::parse(raw.as_str())
                .map_err(|_| DomainError::UnknownParticipant(raw.clone()))?;
            if !self.users.contains(&participant).await {
                return Err(DomainError::UnknownParticipant(participant.to_string()));
            }
            participants.push(participant);
        }

        let room = Room::new(
            RoomId::generate(),
            name,
            creator.clone(),
            participants,
            self.clock.now(),
        )?;

        let mut table = self.rooms.write().await;
        let position = table.ordered.len();
        table.index.insert(room.id, position);
        table.ordered.push(room.clone());

        tracing::info!(
            room_id = %room.id,
            created_by = %room.created_by,
            participants = room.participants.len(),
            "room created"
        );
        Ok(room)
    }

    pub async fn list_rooms_for(&self, username: &Username) -> Vec<Room> {
        let table = self.rooms.read().await;
        table
            .ordered
            .iter()
            .filter(|room| room.has_participant(username))
            .cloned()
            .collect()
    }

    pub async fn get(&self, room_id: RoomId) -> Option<Room> {
        let table = self.rooms.read().await;
        table
            .index
            .get(&room_id)
            .and_then(|&position| table.ordered.get(position))
            .cloned()
    }
}
