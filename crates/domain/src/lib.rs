//! 聊天室系统核心领域模型
//!
//! 包含用户、聊天室、消息等核心实体，传输层事件，以及统一的错误分类。

pub mod chat_room;
pub mod errors;
pub mod events;
pub mod message;
pub mod user;
pub mod value_objects;

// 重新导出常用类型
pub use chat_room::Room;
pub use errors::DomainError;
pub use events::{ClientEvent, ErrorNotice, OutgoingMessage, RoomRef, ServerEvent, TypingNotice};
pub use message::{Message, MessageType};
pub use user::User;
pub use value_objects::{
    ConnectionId, EncryptedContent, MessageId, PasswordHash, RoomId, Timestamp, UserId, Username,
};
