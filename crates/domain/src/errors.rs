//! 领域模型错误定义
//!
//! 核心层所有同步、本地的失败类型。任何一个错误都不会导致进程退出，
//! 调用方（HTTP / WebSocket 层）负责把错误类型展示给用户。

use thiserror::Error;

use crate::value_objects::RoomId;

/// 领域模型错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// 用户名已被注册（大小写敏感的精确匹配）
    #[error("username already exists: {0}")]
    DuplicateUser(String),

    /// 凭证缺失、无效或连接未绑定身份
    #[error("authentication required")]
    Unauthenticated,

    /// 非参与者访问房间
    #[error("access denied")]
    Forbidden,

    #[error("room not found: {0}")]
    UnknownRoom(RoomId),

    /// 创建房间时指定了未注册的用户
    #[error("user '{0}' does not exist")]
    UnknownParticipant(String),

    /// 连接尚未加入该房间
    #[error("connection has not joined the room")]
    NotJoined,

    /// 输入校验失败
    #[error("invalid argument {field}: {reason}")]
    InvalidArgument { field: String, reason: String },
}

impl DomainError {
    /// 创建参数校验错误
    pub fn invalid_argument(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field: field.into(),
            reason: reason.into(),
        }
    }
}
