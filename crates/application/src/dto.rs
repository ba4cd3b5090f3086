use domain::{User, UserId};
use serde::{Deserialize, Serialize};

/// 对外暴露的用户视图，不包含密码哈希
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDto {
    pub user_id: UserId,
    pub username: String,
    pub public_key: Option<String>,
}

impl From<&User> for UserDto {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            username: user.username.as_str().to_owned(),
            public_key: user.public_key.clone(),
        }
    }
}
