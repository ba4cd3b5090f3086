//! 基础设施适配器：bcrypt 密码哈希、旧版内容变换，以及进程内组件装配。

pub mod builder;
pub mod cipher;
pub mod password;

pub use builder::{Infrastructure, InfrastructureConfig};
pub use cipher::{CipherError, LegacyCipher};
pub use password::BcryptPasswordHasher;
