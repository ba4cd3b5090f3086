//! 认证边界
//!
//! 核心层不做密码校验也不签发令牌，只依赖这里的两个接口：
//! 密码哈希器，以及把凭证换成身份的会话网关。

use async_trait::async_trait;
use domain::{PasswordHash, User, UserId, Username};
use thiserror::Error;

use crate::error::ApplicationError;

#[derive(Debug, Error)]
pub enum PasswordHasherError {
    #[error("hash error: {0}")]
    Hash(String),
    #[error("verify error: {0}")]
    Verify(String),
}

impl PasswordHasherError {
    pub fn hash_error(message: impl Into<String>) -> Self {
        Self::Hash(message.into())
    }

    pub fn verify_error(message: impl Into<String>) -> Self {
        Self::Verify(message.into())
    }
}

#[async_trait]
pub trait PasswordHasher: Send + Sync {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError>;
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError>;
}

/// 经过网关认证的调用方身份
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub username: Username,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.clone(),
        }
    }
}

/// 会话网关：签发凭证，并把入站凭证解析为身份。
///
/// 解析失败必须返回 `DomainError::Unauthenticated`。
pub trait SessionGateway: Send + Sync {
    fn issue(&self, identity: &Identity) -> Result<String, ApplicationError>;
    fn authenticate(&self, credential: &str) -> Result<Identity, ApplicationError>;
}
