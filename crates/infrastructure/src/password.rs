use application::{PasswordHasher, PasswordHasherError};
use async_trait::async_trait;
use domain::PasswordHash;

/// bcrypt 哈希器；计算放到阻塞线程池里，避免拖住异步运行时
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, bcrypt::BcryptError> + Send + 'static,
{
    match tokio::task::spawn_blocking(job).await {
        Ok(result) => result.map_err(|err| err.to_string()),
        Err(join_err) => Err(join_err.to_string()),
    }
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = run_blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(PasswordHasherError::hash_error)?;

        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plaintext = plaintext.to_owned();
        let hashed = hashed.as_str().to_owned();
        run_blocking(move || bcrypt::verify(plaintext, &hashed))
            .await
            .map_err(|err| {
                tracing::warn!(error = %err, "bcrypt verify failed");
                PasswordHasherError::verify_error(err)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_then_verify() {
        let hasher = BcryptPasswordHasher::new(4);
        let hashed = hasher.hash("secret").await.unwrap();

        assert_ne!(hashed.as_str(), "secret");
        assert!(hasher.verify("secret", &hashed).await.unwrap());
        assert!(!hasher.verify("Secret", &hashed).await.unwrap());
    }

    #[tokio::test]
    async fn same_password_hashes_differently() {
        let hasher = BcryptPasswordHasher::new(4);
        let first = hasher.hash("secret").await.unwrap();
        let second = hasher.hash("secret").await.unwrap();
        assert_ne!(first.as_str(), second.as_str());
    }

    #[tokio::test]
    async fn malformed_hash_is_an_error() {
        let hasher = BcryptPasswordHasher::new(4);
        let bogus = PasswordHash::new("not-a-bcrypt-hash").unwrap();
        assert!(hasher.verify("secret", &bogus).await.is_err());
    }
}
