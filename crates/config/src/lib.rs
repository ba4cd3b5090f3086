//! 统一配置中心
//!
//! 加载顺序：内置默认值 -> 可选配置文件（`APP_CONFIG_FILE`）-> `APP_` 前缀环境变量，
//! 嵌套字段用 `__` 分隔，例如 `APP_SERVER__PORT=8080`。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

/// 连接加入房间时的准入策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinPolicy {
    /// 只有房间参与者可以加入
    #[default]
    ParticipantsOnly,
    /// 任何已认证连接都可以加入任意房间
    Open,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1, max = 65535))]
    pub port: u16,
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct JwtConfig {
    #[validate(length(min = 32, message = "JWT secret must be at least 32 characters long"))]
    pub secret: String,
    #[validate(range(min = 1))]
    pub expiration_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SecurityConfig {
    #[validate(range(min = 4, max = 31))]
    pub bcrypt_cost: u32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PresenceConfig {
    #[serde(default)]
    pub join_policy: JoinPolicy,
}

/// 全局应用配置
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub presence: PresenceConfig,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ValidationErrors),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Load(Box::new(err))
    }
}

impl Default for AppConfig {
    /// 开发环境默认值，生产环境必须覆盖 JWT 密钥
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".into(),
                port: 5000,
                cors_origins: vec!["http://localhost:3000".into()],
            },
            jwt: JwtConfig {
                secret: "dev-secret-key-not-for-production-use-minimum-32-chars".into(),
                expiration_hours: 24,
            },
            security: SecurityConfig { bcrypt_cost: 12 },
            presence: PresenceConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var("APP_CONFIG_FILE") {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = figment.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// 用于日志输出，隐藏密钥
    pub fn sanitize(&self) -> String {
        let mut redacted = self.clone();
        redacted.jwt.secret = "[REDACTED]".into();
        format!("{:?}", redacted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.presence.join_policy, JoinPolicy::ParticipantsOnly);
        assert_eq!(config.bind_address(), "127.0.0.1:5000");
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let mut config = AppConfig::default();
        config.jwt.secret = "short".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn bcrypt_cost_bounds() {
        let mut config = AppConfig::default();
        config.security.bcrypt_cost = 4;
        assert!(config.validate().is_ok());
        config.security.bcrypt_cost = 3;
        assert!(config.validate().is_err());
        config.security.bcrypt_cost = 32;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn sanitize_hides_secret() {
        let config = AppConfig::default();
        let text = config.sanitize();
        assert!(!text.contains(&config.jwt.secret));
        assert!(text.contains("[REDACTED]"));
    }

    #[test]
    fn env_overrides_file_and_defaults() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "app.toml",
                r#"
                [server]
                host = "0.0.0.0"
                port = 7000

                [presence]
                join_policy = "open"
                "#,
            )?;
            jail.set_env("APP_CONFIG_FILE", "app.toml");
            jail.set_env("APP_SERVER__PORT", "7100");

            let config = AppConfig::from_figment(AppConfig::figment()).expect("config loads");
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.port, 7100);
            assert_eq!(config.presence.join_policy, JoinPolicy::Open);
            assert_eq!(config.security.bcrypt_cost, 12);
            Ok(())
        });
    }

    #[test]
    fn invalid_env_value_fails_validation() {
        Jail::expect_with(|jail| {
            jail.set_env("APP_SECURITY__BCRYPT_COST", "2");
            let result = AppConfig::from_figment(AppConfig::figment());
            assert!(matches!(result, Err(ConfigError::Invalid(_))));
            Ok(())
        });
    }
}
