//! 应用层实现。
//!
//! 内存中的用户目录、房间注册表、消息存储与在线状态中心，
//! 以及围绕它们的用例服务和对外部适配器（密码哈希、会话网关、时钟）的抽象。

pub mod auth;
pub mod clock;
pub mod dto;
pub mod error;
pub mod message_store;
pub mod presence;
pub mod room_registry;
pub mod services;
pub mod user_directory;

pub use auth::{Identity, PasswordHasher, PasswordHasherError, SessionGateway};
pub use clock::{Clock, SystemClock};
pub use dto::UserDto;
pub use error::ApplicationError;
pub use message_store::MessageStore;
pub use presence::{Outbox, PresenceHub};
pub use room_registry::RoomRegistry;
pub use services::{
    AuthenticateUserRequest, ChatService, ChatServiceDependencies, CreateRoomRequest,
    RegisterUserRequest, UserService, UserServiceDependencies,
};
pub use user_directory::UserDirectory;
