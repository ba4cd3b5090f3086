use std::sync::Arc;

use application::{
    ChatService, ChatServiceDependencies, Clock, MessageStore, PasswordHasher, PresenceHub,
    RoomRegistry, SystemClock, UserDirectory, UserService, UserServiceDependencies,
};
use config::{AppConfig, JoinPolicy};

use crate::password::BcryptPasswordHasher;

#[derive(Debug, Clone)]
pub struct InfrastructureConfig {
    pub bcrypt_cost: u32,
    pub join_policy: JoinPolicy,
}

impl From<&AppConfig> for InfrastructureConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            bcrypt_cost: config.security.bcrypt_cost,
            join_policy: config.presence.join_policy,
        }
    }
}

/// 组装好的内存存储与服务，进程内共享
#[derive(Clone)]
pub struct Infrastructure {
    password_hasher: Arc<dyn PasswordHasher>,
    pub users: Arc<UserDirectory>,
    pub rooms: Arc<RoomRegistry>,
    pub messages: Arc<MessageStore>,
    pub hub: Arc<PresenceHub>,
}

impl Infrastructure {
    pub fn build(config: InfrastructureConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let users = Arc::new(UserDirectory::new(clock.clone()));
        let rooms = Arc::new(RoomRegistry::new(users.clone(), clock.clone()));
        let messages = Arc::new(MessageStore::new(rooms.clone(), clock));
        let hub = Arc::new(PresenceHub::new(
            rooms.clone(),
            messages.clone(),
            config.join_policy,
        ));

        tracing::info!(
            bcrypt_cost = config.bcrypt_cost,
            join_policy = ?config.join_policy,
            "in-memory infrastructure ready"
        );

        Self {
            password_hasher: Arc::new(BcryptPasswordHasher::new(config.bcrypt_cost)),
            users,
            rooms,
            messages,
            hub,
        }
    }

    pub fn user_service(&self) -> UserService {
        UserService::new(UserServiceDependencies {
            users: self.users.clone(),
            password_hasher: self.password_hasher.clone(),
        })
    }

    pub fn chat_service(&self) -> ChatService {
        ChatService::new(ChatServiceDependencies {
            rooms: self.rooms.clone(),
            messages: self.messages.clone(),
        })
    }
}
