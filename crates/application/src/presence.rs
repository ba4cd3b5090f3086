//! 在线状态中心
//!
//! 维护连接与房间在线成员之间的关系，并负责事件扇出。
//! 每个房间一把互斥锁；追加消息与广播都在锁内完成，
//! 所以同一房间内日志顺序与广播顺序一致。加锁顺序固定为 连接 -> 房间。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use config::JoinPolicy;
use domain::{
    ConnectionId, DomainError, EncryptedContent, Message, MessageType, RoomId, ServerEvent,
    Username,
};
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::{auth::Identity, message_store::MessageStore, room_registry::RoomRegistry};

/// 单个连接的出站事件通道
pub type Outbox = mpsc::UnboundedSender<ServerEvent>;

struct Connection {
    identity: Identity,
    outbox: Outbox,
    joined: HashSet<RoomId>,
    /// 最近一次上报为“正在输入”的房间
    typing: HashSet<RoomId>,
    closed: bool,
}

#[derive(Default)]
struct LiveRoom {
    members: HashMap<ConnectionId, Outbox>,
}

impl LiveRoom {
    fn fan_out(&self, room_id: RoomId, event: &ServerEvent, except: Option<ConnectionId>) -> usize {
        let mut delivered = 0;
        for (connection_id, outbox) in &self.members {
            if Some(*connection_id) == except {
                continue;
            }
            match outbox.send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(_) => tracing::warn!(
                    room_id = %room_id,
                    connection_id = %connection_id,
                    "dropping event for closed outbox"
                ),
            }
        }
        delivered
    }
}

pub struct PresenceHub {
    rooms: Arc<RoomRegistry>,
    messages: Arc<MessageStore>,
    policy: JoinPolicy,
    connections: RwLock<HashMap<ConnectionId, Arc<Mutex<Connection>>>>,
    live_rooms: RwLock<HashMap<RoomId, Arc<Mutex<LiveRoom>>>>,
}

impl PresenceHub {
    pub fn new(rooms: Arc<RoomRegistry>, messages: Arc<MessageStore>, policy: JoinPolicy) -> Self {
        Self {
            rooms,
            messages,
            policy,
            connections: RwLock::new(HashMap::new()),
            live_rooms: RwLock::new(HashMap::new()),
        }
    }

    pub async fn connect(&self, identity: Identity, outbox: Outbox) -> ConnectionId {
        let connection_id = ConnectionId::generate();
        tracing::info!(
            connection_id = %connection_id,
            username = %identity.username,
            "connection opened"
        );

        let connection = Connection {
            identity,
            outbox,
            joined: HashSet::new(),
            typing: HashSet::new(),
            closed: false,
        };
        self.connections
            .write()
            .await
            .insert(connection_id, Arc::new(Mutex::new(connection)));
        connection_id
    }

    pub async fn join(&self, connection_id: ConnectionId, room_id: RoomId) -> Result<(), DomainError> {
        let handle = self.connection(connection_id).await?;
        let mut connection = handle.lock().await;
        if connection.closed {
            return Err(DomainError::Unauthenticated);
        }
        if connection.joined.contains(&room_id) {
            return Ok(());
        }

        self.check_policy(&connection.identity.username, room_id).await?;

        let live = self.live_room_or_insert(room_id).await;
        live.lock()
            .await
            .members
            .insert(connection_id, connection.outbox.clone());
        connection.joined.insert(room_id);

        tracing::info!(
            connection_id = %connection_id,
            room_id = %room_id,
            username = %connection.identity.username,
            "joined room"
        );
        Ok(())
    }

    /// 未加入时什么也不做
    pub async fn leave(&self, connection_id: ConnectionId, room_id: RoomId) {
        let Ok(handle) = self.connection(connection_id).await else {
            return;
        };
        let mut connection = handle.lock().await;
        if !connection.joined.remove(&room_id) {
            return;
        }
        let was_typing = connection.typing.remove(&room_id);
        let username = connection.identity.username.clone();

        self.evict(connection_id, room_id, &username, was_typing).await;
        tracing::info!(connection_id = %connection_id, room_id = %room_id, "left room");
    }

    pub async fn publish(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        sender: &Username,
        encrypted_content: EncryptedContent,
        message_type: MessageType,
    ) -> Result<Message, DomainError> {
        // 已断开的连接不再属于任何房间
        let handle = self
            .connection(connection_id)
            .await
            .map_err(|_| DomainError::NotJoined)?;
        let connection = handle.lock().await;
        if connection.closed || !connection.joined.contains(&room_id) {
            return Err(DomainError::NotJoined);
        }
        if connection.identity.username != *sender {
            tracing::warn!(
                connection_id = %connection_id,
                claimed = %sender,
                "sender does not match connection identity"
            );
            return Err(DomainError::Forbidden);
        }

        let live = self.live_room(room_id).await.ok_or(DomainError::NotJoined)?;
        let live = live.lock().await;
        let message = self
            .messages
            .append(room_id, sender.clone(), encrypted_content, message_type)
            .await?;

        let delivered = live.fan_out(room_id, &ServerEvent::NewMessage(message.clone()), None);
        tracing::debug!(
            room_id = %room_id,
            message_id = %message.id,
            delivered,
            "message broadcast"
        );
        Ok(message)
    }

    pub async fn set_typing(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        is_typing: bool,
    ) -> Result<(), DomainError> {
        let handle = self
            .connection(connection_id)
            .await
            .map_err(|_| DomainError::NotJoined)?;
        let mut connection = handle.lock().await;
        if connection.closed || !connection.joined.contains(&room_id) {
            return Err(DomainError::NotJoined);
        }
        if is_typing {
            connection.typing.insert(room_id);
        } else {
            connection.typing.remove(&room_id);
        }

        let Some(live) = self.live_room(room_id).await else {
            return Ok(());
        };
        let event = ServerEvent::typing(connection.identity.username.clone(), room_id, is_typing);
        live.lock().await.fan_out(room_id, &event, Some(connection_id));
        Ok(())
    }

    /// 重复调用安全
    pub async fn disconnect(&self, connection_id: ConnectionId) {
        let Some(handle) = self.connections.write().await.remove(&connection_id) else {
            return;
        };
        let mut connection = handle.lock().await;
        if connection.closed {
            return;
        }
        connection.closed = true;

        let username = connection.identity.username.clone();
        let joined: Vec<RoomId> = connection.joined.drain().collect();
        for room_id in joined {
            let was_typing = connection.typing.remove(&room_id);
            self.evict(connection_id, room_id, &username, was_typing).await;
        }
        connection.typing.clear();

        tracing::info!(connection_id = %connection_id, username = %username, "connection closed");
    }

    pub async fn live_members(&self, room_id: RoomId) -> usize {
        match self.live_room(room_id).await {
            Some(live) => live.lock().await.members.len(),
            None => 0,
        }
    }

    async fn connection(&self, connection_id: ConnectionId) -> Result<Arc<Mutex<Connection>>, DomainError> {
        self.connections
            .read()
            .await
            .get(&connection_id)
            .cloned()
            .ok_or(DomainError::Unauthenticated)
    }

    async fn live_room(&self, room_id: RoomId) -> Option<Arc<Mutex<LiveRoom>>> {
        self.live_rooms.read().await.get(&room_id).cloned()
    }

    async fn live_room_or_insert(&self, room_id: RoomId) -> Arc<Mutex<LiveRoom>> {
        self.live_rooms
            .write()
            .await
            .entry(room_id)
            .or_default()
            .clone()
    }

    /// 任何策略下房间都必须已存在，在线房间数因此不超过已创建房间数
    async fn check_policy(&self, username: &Username, room_id: RoomId) -> Result<(), DomainError> {
        let room = self
            .rooms
            .get(room_id)
            .await
            .ok_or(DomainError::UnknownRoom(room_id))?;
        match self.policy {
            JoinPolicy::Open => Ok(()),
            JoinPolicy::ParticipantsOnly if room.has_participant(username) => Ok(()),
            JoinPolicy::ParticipantsOnly => {
                tracing::warn!(room_id = %room_id, username = %username, "join refused");
                Err(DomainError::Forbidden)
            }
        }
    }

    /// 把连接移出房间在线集合；若它仍处于输入状态，则通知其余成员停止输入
    async fn evict(
        &self,
        connection_id: ConnectionId,
        room_id: RoomId,
        username: &Username,
        was_typing: bool,
    ) {
        let Some(live) = self.live_room(room_id).await else {
            return;
        };
        let mut live = live.lock().await;
        live.members.remove(&connection_id);
        if was_typing {
            let event = ServerEvent::typing(username.clone(), room_id, false);
            live.fan_out(room_id, &event, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, SystemClock};
    use crate::user_directory::UserDirectory;
    use domain::{PasswordHash, Room};
    use tokio::sync::mpsc::UnboundedReceiver;

    struct Fixture {
        users: Arc<UserDirectory>,
        rooms: Arc<RoomRegistry>,
        messages: Arc<MessageStore>,
        hub: PresenceHub,
    }

    fn name(value: &str) -> Username {
        Username::parse(value).unwrap()
    }

    fn content(value: &str) -> EncryptedContent {
        EncryptedContent::new(value).unwrap()
    }

    async fn fixture(policy: JoinPolicy) -> Fixture {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let users = Arc::new(UserDirectory::new(clock.clone()));
        for user in ["alice", "bob", "carol"] {
            users
                .register(name(user), PasswordHash::new("hash").unwrap())
                .await
                .unwrap();
        }
        let rooms = Arc::new(RoomRegistry::new(users.clone(), clock.clone()));
        let messages = Arc::new(MessageStore::new(rooms.clone(), clock));
        let hub = PresenceHub::new(rooms.clone(), messages.clone(), policy);
        Fixture {
            users,
            rooms,
            messages,
            hub,
        }
    }

    impl Fixture {
        async fn room(&self, creator: &str, participants: &[&str]) -> Room {
            let participants: Vec<String> = participants.iter().map(|p| p.to_string()).collect();
            self.rooms
                .create_room("R", &name(creator), &participants)
                .await
                .unwrap()
        }

        async fn connect(&self, username: &str) -> (ConnectionId, UnboundedReceiver<ServerEvent>) {
            let user = self.users.find(&name(username)).await.unwrap();
            let (tx, rx) = mpsc::unbounded_channel();
            let id = self.hub.connect(Identity::from(&user), tx).await;
            (id, rx)
        }
    }

    fn drain(rx: &mut UnboundedReceiver<ServerEvent>) -> Vec<ServerEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test]
    async fn join_twice_keeps_single_membership() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, _rx) = fx.connect("alice").await;

        fx.hub.join(alice, room.id).await.unwrap();
        fx.hub.join(alice, room.id).await.unwrap();

        assert_eq!(fx.hub.live_members(room.id).await, 1);
    }

    #[tokio::test]
    async fn non_participant_join_is_forbidden() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (carol, _rx) = fx.connect("carol").await;

        let err = fx.hub.join(carol, room.id).await.unwrap_err();
        assert_eq!(err, DomainError::Forbidden);
        assert_eq!(fx.hub.live_members(room.id).await, 0);
    }

    #[tokio::test]
    async fn join_unknown_room_fails() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let (alice, _rx) = fx.connect("alice").await;
        let missing = RoomId::generate();

        let err = fx.hub.join(alice, missing).await.unwrap_err();
        assert_eq!(err, DomainError::UnknownRoom(missing));
    }

    #[tokio::test]
    async fn open_policy_admits_non_participants() {
        let fx = fixture(JoinPolicy::Open).await;
        let room = fx.room("alice", &["bob"]).await;
        let (carol, _rx) = fx.connect("carol").await;

        fx.hub.join(carol, room.id).await.unwrap();
        assert_eq!(fx.hub.live_members(room.id).await, 1);
    }

    #[tokio::test]
    async fn open_policy_still_requires_an_existing_room() {
        let fx = fixture(JoinPolicy::Open).await;
        let (carol, _rx) = fx.connect("carol").await;
        let missing = RoomId::generate();

        let err = fx.hub.join(carol, missing).await.unwrap_err();
        assert_eq!(err, DomainError::UnknownRoom(missing));
        assert!(fx.hub.live_rooms.read().await.is_empty());
    }

    #[tokio::test]
    async fn join_on_unknown_connection_is_unauthenticated() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &[]).await;

        let err = fx.hub.join(ConnectionId::generate(), room.id).await.unwrap_err();
        assert_eq!(err, DomainError::Unauthenticated);
    }

    #[tokio::test]
    async fn leave_without_join_is_a_no_op() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, _rx) = fx.connect("alice").await;

        fx.hub.leave(alice, room.id).await;
        fx.hub.leave(ConnectionId::generate(), room.id).await;
        assert_eq!(fx.hub.live_members(room.id).await, 0);
    }

    #[tokio::test]
    async fn leave_while_typing_notifies_and_stops_delivery() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, mut alice_rx) = fx.connect("alice").await;
        let (bob, mut bob_rx) = fx.connect("bob").await;
        fx.hub.join(alice, room.id).await.unwrap();
        fx.hub.join(bob, room.id).await.unwrap();
        fx.hub.set_typing(alice, room.id, true).await.unwrap();
        drain(&mut bob_rx);

        fx.hub.leave(alice, room.id).await;
        fx.hub.leave(alice, room.id).await;

        assert_eq!(fx.hub.live_members(room.id).await, 1);
        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerEvent::typing(name("alice"), room.id, false)]
        );

        let err = fx
            .hub
            .publish(alice, room.id, &name("alice"), content("x"), MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotJoined);

        let message = fx
            .hub
            .publish(bob, room.id, &name("bob"), content("y"), MessageType::Text)
            .await
            .unwrap();
        assert_eq!(drain(&mut bob_rx), vec![ServerEvent::NewMessage(message.clone())]);
        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(fx.messages.list_for(room.id).await, vec![message]);

        // 离开后可以重新加入
        fx.hub.join(alice, room.id).await.unwrap();
        assert_eq!(fx.hub.live_members(room.id).await, 2);
    }

    #[tokio::test]
    async fn publish_reaches_every_live_member_including_sender() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, mut alice_rx) = fx.connect("alice").await;
        let (bob, mut bob_rx) = fx.connect("bob").await;
        let (bob_tab, mut bob_tab_rx) = fx.connect("bob").await;
        for id in [alice, bob, bob_tab] {
            fx.hub.join(id, room.id).await.unwrap();
        }

        let message = fx
            .hub
            .publish(alice, room.id, &name("alice"), content("aGk="), MessageType::Text)
            .await
            .unwrap();

        let mut deliveries = 0;
        for rx in [&mut alice_rx, &mut bob_rx, &mut bob_tab_rx] {
            let events = drain(rx);
            assert_eq!(events, vec![ServerEvent::NewMessage(message.clone())]);
            deliveries += events.len();
        }
        assert_eq!(deliveries, 3);
        assert_eq!(fx.messages.list_for(room.id).await, vec![message]);
    }

    #[tokio::test]
    async fn publish_requires_join() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, _rx) = fx.connect("alice").await;

        let err = fx
            .hub
            .publish(alice, room.id, &name("alice"), content("x"), MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotJoined);
        assert!(fx.messages.list_for(room.id).await.is_empty());
    }

    #[tokio::test]
    async fn publish_with_foreign_sender_is_forbidden() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (bob, mut bob_rx) = fx.connect("bob").await;
        fx.hub.join(bob, room.id).await.unwrap();

        let err = fx
            .hub
            .publish(bob, room.id, &name("alice"), content("x"), MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::Forbidden);
        assert!(drain(&mut bob_rx).is_empty());
        assert!(fx.messages.list_for(room.id).await.is_empty());
    }

    #[tokio::test]
    async fn closed_outbox_does_not_fail_publish() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, mut alice_rx) = fx.connect("alice").await;
        let (bob, bob_rx) = fx.connect("bob").await;
        fx.hub.join(alice, room.id).await.unwrap();
        fx.hub.join(bob, room.id).await.unwrap();
        drop(bob_rx);

        let message = fx
            .hub
            .publish(alice, room.id, &name("alice"), content("x"), MessageType::Text)
            .await
            .unwrap();
        assert_eq!(drain(&mut alice_rx), vec![ServerEvent::NewMessage(message)]);
    }

    #[tokio::test]
    async fn typing_is_not_echoed_to_sender() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, mut alice_rx) = fx.connect("alice").await;
        let (bob, mut bob_rx) = fx.connect("bob").await;
        fx.hub.join(alice, room.id).await.unwrap();
        fx.hub.join(bob, room.id).await.unwrap();

        fx.hub.set_typing(alice, room.id, true).await.unwrap();
        fx.hub.set_typing(alice, room.id, false).await.unwrap();

        assert!(drain(&mut alice_rx).is_empty());
        assert_eq!(
            drain(&mut bob_rx),
            vec![
                ServerEvent::typing(name("alice"), room.id, true),
                ServerEvent::typing(name("alice"), room.id, false),
            ]
        );
        assert!(fx.messages.list_for(room.id).await.is_empty());
    }

    #[tokio::test]
    async fn typing_requires_join() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &[]).await;
        let (alice, _rx) = fx.connect("alice").await;

        let err = fx.hub.set_typing(alice, room.id, true).await.unwrap_err();
        assert_eq!(err, DomainError::NotJoined);
    }

    #[tokio::test]
    async fn disconnect_removes_membership_everywhere() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let first = fx.room("alice", &["bob"]).await;
        let second = fx.room("bob", &["alice"]).await;
        let (alice, _rx) = fx.connect("alice").await;
        fx.hub.join(alice, first.id).await.unwrap();
        fx.hub.join(alice, second.id).await.unwrap();

        fx.hub.disconnect(alice).await;
        fx.hub.disconnect(alice).await;

        assert_eq!(fx.hub.live_members(first.id).await, 0);
        assert_eq!(fx.hub.live_members(second.id).await, 0);
        let err = fx
            .hub
            .publish(alice, first.id, &name("alice"), content("x"), MessageType::Text)
            .await
            .unwrap_err();
        assert_eq!(err, DomainError::NotJoined);
    }

    #[tokio::test]
    async fn disconnect_while_typing_notifies_remaining_members() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, _alice_rx) = fx.connect("alice").await;
        let (bob, mut bob_rx) = fx.connect("bob").await;
        fx.hub.join(alice, room.id).await.unwrap();
        fx.hub.join(bob, room.id).await.unwrap();
        fx.hub.set_typing(alice, room.id, true).await.unwrap();
        drain(&mut bob_rx);

        fx.hub.disconnect(alice).await;

        assert_eq!(
            drain(&mut bob_rx),
            vec![ServerEvent::typing(name("alice"), room.id, false)]
        );
        assert_eq!(fx.hub.live_members(room.id).await, 1);
    }

    #[tokio::test]
    async fn disconnect_after_stop_typing_sends_nothing() {
        let fx = fixture(JoinPolicy::ParticipantsOnly).await;
        let room = fx.room("alice", &["bob"]).await;
        let (alice, _alice_rx) = fx.connect("alice").await;
        let (bob, mut bob_rx) = fx.connect("bob").await;
        fx.hub.join(alice, room.id).await.unwrap();
        fx.hub.join(bob, room.id).await.unwrap();
        fx.hub.set_typing(alice, room.id, true).await.unwrap();
        fx.hub.set_typing(alice, room.id, false).await.unwrap();
        drain(&mut bob_rx);

        fx.hub.disconnect(alice).await;
        assert!(drain(&mut bob_rx).is_empty());
    }

    #[tokio::test]
    async fn broadcast_order_matches_log_order() {
        let fx = Arc::new(fixture(JoinPolicy::ParticipantsOnly).await);
        let room_id = fx.room("alice", &["bob"]).await.id;
        let (observer, mut observer_rx) = fx.connect("alice").await;
        fx.hub.join(observer, room_id).await.unwrap();

        let mut writers = Vec::new();
        for user in ["alice", "bob"] {
            let (id, _rx) = fx.connect(user).await;
            fx.hub.join(id, room_id).await.unwrap();
            let fx = fx.clone();
            writers.push(tokio::spawn(async move {
                for i in 0..25 {
                    let body = content(&format!("{user}-{i}"));
                    fx.hub
                        .publish(id, room_id, &name(user), body, MessageType::Text)
                        .await
                        .unwrap();
                }
            }));
        }
        for writer in writers {
            writer.await.unwrap();
        }

        let broadcast: Vec<Message> = drain(&mut observer_rx)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::NewMessage(message) => Some(message),
                _ => None,
            })
            .collect();
        assert_eq!(broadcast.len(), 50);
        assert_eq!(broadcast, fx.messages.list_for(room_id).await);
    }
}
