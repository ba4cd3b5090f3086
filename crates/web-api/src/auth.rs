//! JWT 认证
//!
//! 提供 token 签发与校验，作为应用层 `SessionGateway` 的实现。

use application::{ApplicationError, Identity, SessionGateway};
use axum::http::HeaderMap;
use config::JwtConfig;
use domain::{UserId, Username};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// JWT Claims 结构
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub user_id: UserId,
    pub username: String,
    pub exp: i64, // 过期时间 (Unix timestamp)
}

/// JWT Token 服务
#[derive(Clone)]
pub struct JwtService {
    config: JwtConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtService {
    pub fn new(config: JwtConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.secret.as_ref());
        let decoding_key = DecodingKey::from_secret(config.secret.as_ref());

        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// 从 `Authorization: Bearer <token>` 中解析身份
    pub fn extract_identity_from_headers(&self, headers: &HeaderMap) -> Result<Identity, ApiError> {
        let token = bearer_token(headers)
            .ok_or_else(|| ApiError::unauthorized("missing or malformed authorization header"))?;
        Ok(self.authenticate(token)?)
    }
}

impl SessionGateway for JwtService {
    fn issue(&self, identity: &Identity) -> Result<String, ApplicationError> {
        let exp = chrono::Utc::now() + chrono::Duration::hours(self.config.expiration_hours);
        let claims = Claims {
            user_id: identity.user_id,
            username: identity.username.to_string(),
            exp: exp.timestamp(),
        };

        encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|err| ApplicationError::infrastructure(format!("token generation failed: {err}")))
    }

    fn authenticate(&self, credential: &str) -> Result<Identity, ApplicationError> {
        let claims = decode::<Claims>(credential, &self.decoding_key, &Validation::default())
            .map(|token_data| token_data.claims)
            .map_err(|err| {
                tracing::debug!(error = %err, "rejecting token");
                ApplicationError::unauthenticated()
            })?;

        let username =
            Username::parse(claims.username).map_err(|_| ApplicationError::unauthenticated())?;
        Ok(Identity {
            user_id: claims.user_id,
            username,
        })
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}
