use std::sync::Arc;

use domain::{DomainError, User, Username};

use crate::{
    auth::PasswordHasher, error::ApplicationError, user_directory::UserDirectory,
};

#[derive(Debug, Clone)]
pub struct RegisterUserRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct AuthenticateUserRequest {
    pub username: String,
    pub password: String,
}

pub struct UserServiceDependencies {
    pub users: Arc<UserDirectory>,
    pub password_hasher: Arc<dyn PasswordHasher>,
}

pub struct UserService {
    deps: UserServiceDependencies,
}

impl UserService {
    pub fn new(deps: UserServiceDependencies) -> Self {
        Self { deps }
    }

    pub async fn register(&self, request: RegisterUserRequest) -> Result<User, ApplicationError> {
        let username = Username::parse(request.username)?;
        if request.password.is_empty() {
            return Err(DomainError::invalid_argument("password", "must not be empty").into());
        }

        // 先查一次，避免为注定失败的注册付出哈希开销；目录内部仍会再次原子检查
        if self.deps.users.contains(&username).await {
            return Err(DomainError::DuplicateUser(username.to_string()).into());
        }

        let password_hash = self.deps.password_hasher.hash(&request.password).await?;
        let user = self.deps.users.register(username, password_hash).await?;
        Ok(user)
    }

    /// 任何失败（用户名非法、用户不存在、密码错误）都统一报告为未认证
    pub async fn authenticate(
        &self,
        request: AuthenticateUserRequest,
    ) -> Result<User, ApplicationError> {
        let username =
            Username::parse(request.username).map_err(|_| ApplicationError::unauthenticated())?;
        let user = self
            .deps
            .users
            .find(&username)
            .await
            .ok_or_else(ApplicationError::unauthenticated)?;

        let password_ok = self
            .deps
            .password_hasher
            .verify(&request.password, &user.password)
            .await?;
        if !password_ok {
            tracing::debug!(username = %username, "password mismatch");
            return Err(ApplicationError::unauthenticated());
        }

        Ok(user)
    }

    pub async fn register_public_key(
        &self,
        username: &Username,
        public_key: String,
    ) -> Result<(), ApplicationError> {
        if public_key.trim().is_empty() {
            return Err(DomainError::invalid_argument("publicKey", "must not be empty").into());
        }
        self.deps.users.set_public_key(username, public_key).await;
        Ok(())
    }

    pub async fn find(&self, username: &Username) -> Option<User> {
        self.deps.users.find(username).await
    }
}
