use std::collections::HashMap;
use std::sync::Arc;

use domain::{DomainError, PasswordHash, User, UserId, Username};
use tokio::sync::RwLock;

use crate::clock::Clock;

/// 已注册用户及其公钥。用户一旦注册就不会被删除。
pub struct UserDirectory {
    users: RwLock<HashMap<Username, User>>,
    clock: Arc<dyn Clock>,
}

impl UserDirectory {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub async fn register(
        &self,
        username: Username,
        password: PasswordHash,
    ) -> Result<User, DomainError> {
        let mut users = self.users.write().await;
        if users.contains_key(&username) {
            return Err(DomainError::DuplicateUser(username.to_string()));
        }

        let user = User::register(UserId::generate(), username.clone(), password, self.clock.now());
        users.insert(username, user.clone());

        tracing::info!(user_id = %user.id, username = %user.username, "user registered");
        Ok(user)
    }

    pub async fn find(&self, username: &Username) -> Option<User> {
        self.users.read().await.get(username).cloned()
    }

    pub async fn contains(&self, username: &Username) -> bool {
        self.users.read().await.contains_key(username)
    }

    /// 用户不存在时静默忽略
    pub async fn set_public_key(&self, username: &Username, key: impl Into<String>) {
        let mut users = self.users.write().await;
        match users.get_mut(username) {
            Some(user) => {
                user.set_public_key(key);
                tracing::debug!(username = %username, "public key updated");
            }
            None => tracing::debug!(username = %username, "public key for unknown user ignored"),
        }
    }
}
