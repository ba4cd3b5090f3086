use crate::value_objects::{PasswordHash, Timestamp, UserId, Username};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: Username,
    pub password: PasswordHash,
    pub public_key: Option<String>,
    pub created_at: Timestamp,
}

impl User {
    pub fn register(
        id: UserId,
        username: Username,
        password: PasswordHash,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            username,
            password,
            public_key: None,
            created_at: now,
        }
    }

    /// 覆盖之前上报的公钥
    pub fn set_public_key(&mut self, key: impl Into<String>) {
        self.public_key = Some(key.into());
    }
}
