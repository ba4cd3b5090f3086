//! 传输层事件
//!
//! 每个连接上以 JSON 文本帧传递的离散事件，格式为
//! `{"event": "<kebab-case 名称>", "data": {...}}`。

use serde::{Deserialize, Serialize};

use crate::message::{Message, MessageType};
use crate::value_objects::{RoomId, Username};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomRef {
    pub room_id: RoomId,
}

/// 客户端要发送的消息。旧客户端会带上 sender，它必须与连接身份一致；
/// 省略时使用连接身份。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub room_id: RoomId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub encrypted_content: String,
    #[serde(default, rename = "type")]
    pub message_type: MessageType,
}

/// 客户端 -> 服务端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ClientEvent {
    JoinRoom(RoomRef),
    LeaveRoom(RoomRef),
    SendMessage(OutgoingMessage),
    Typing(RoomRef),
    StopTyping(RoomRef),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypingNotice {
    pub user: Username,
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub code: String,
    pub message: String,
}

/// 服务端 -> 客户端
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum ServerEvent {
    NewMessage(Message),
    UserTyping(TypingNotice),
    UserStopTyping(TypingNotice),
    Error(ErrorNotice),
}

impl ServerEvent {
    pub fn typing(user: Username, room_id: RoomId, is_typing: bool) -> Self {
        let notice = TypingNotice { user, room_id };
        if is_typing {
            Self::UserTyping(notice)
        } else {
            Self::UserStopTyping(notice)
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Error(ErrorNotice {
            code: code.into(),
            message: message.into(),
        })
    }
}
