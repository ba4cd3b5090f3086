//! 旧客户端使用的可逆内容变换
//!
//! `encode(p, k) = base64(reverse(base64(p)) + k[..10])`，`decode` 为其逆运算。
//! 这只是混淆，不提供任何机密性；保留它仅为了与旧客户端的线上格式兼容。

use data_encoding::BASE64;
use thiserror::Error;

/// 取密钥前缀的长度
pub const KEY_PREFIX_LEN: usize = 10;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CipherError {
    #[error("key must be at least {KEY_PREFIX_LEN} characters")]
    KeyTooShort,
    #[error("payload is not valid base64")]
    InvalidEncoding,
    #[error("payload is too short to carry a key suffix")]
    Truncated,
    #[error("decoded payload is not valid UTF-8")]
    InvalidUtf8,
}

#[derive(Debug, Clone)]
pub struct LegacyCipher {
    key_prefix: String,
}

impl LegacyCipher {
    pub fn new(key: &str) -> Result<Self, CipherError> {
        let key_prefix: String = key.chars().take(KEY_PREFIX_LEN).collect();
        if key_prefix.chars().count() < KEY_PREFIX_LEN {
            return Err(CipherError::KeyTooShort);
        }
        Ok(Self { key_prefix })
    }

    pub fn encode(&self, plaintext: &str) -> String {
        let inner = BASE64.encode(plaintext.as_bytes());
        let mut mixed: String = inner.chars().rev().collect();
        mixed.push_str(&self.key_prefix);
        BASE64.encode(mixed.as_bytes())
    }

    pub fn decode(&self, payload: &str) -> Result<String, CipherError> {
        let outer = BASE64
            .decode(payload.as_bytes())
            .map_err(|_| CipherError::InvalidEncoding)?;
        let mixed = String::from_utf8(outer).map_err(|_| CipherError::InvalidUtf8)?;

        let body_len = mixed
            .len()
            .checked_sub(self.key_prefix.len())
            .ok_or(CipherError::Truncated)?;
        let body = mixed.get(..body_len).ok_or(CipherError::Truncated)?;
        let inner: String = body.chars().rev().collect();

        let plain = BASE64
            .decode(inner.as_bytes())
            .map_err(|_| CipherError::InvalidEncoding)?;
        String::from_utf8(plain).map_err(|_| CipherError::InvalidUtf8)
    }
}
