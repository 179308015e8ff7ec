use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, SaltString},
    Argon2, PasswordHasher, PasswordVerifier,
};
use error_stack::{Report, ResultExt};

use crate::Error;

/// An argon2 password hash in PHC string format.
#[derive(Debug, Clone)]
pub struct HashedPassword(pub String);

/// Hash a password. Hashing is CPU-heavy by design, so it runs on a blocking thread.
pub async fn new_hash(password: String) -> Result<HashedPassword, Report<Error>> {
    let hash = tokio::task::spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
    })
    .await
    .change_context(Error::AuthSubsystem)?
    .change_context(Error::AuthSubsystem)?;

    Ok(HashedPassword(hash))
}

/// Check a password against a stored hash, on a blocking thread.
pub async fn verify_password(hash: String, password: String) -> Result<bool, Report<Error>> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&hash).change_context(Error::AuthSubsystem)?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .change_context(Error::AuthSubsystem)?
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn hash_and_verify() {
        let hash = new_hash("correct horse".to_string()).await.unwrap();

        assert!(verify_password(hash.0.clone(), "correct horse".to_string())
            .await
            .unwrap());
        assert!(!verify_password(hash.0, "wrong horse".to_string())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn garbage_hash_is_an_error() {
        let result = verify_password("not-a-phc-string".to_string(), "pw".to_string()).await;
        assert!(result.is_err());
    }
}
