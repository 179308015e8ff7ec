use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgExecutor;
use uuid::Uuid;

use crate::users::UserId;

const KEY_PREFIX: &str = "apk-";

/// A freshly generated API key. The full key string is only available here, at creation
/// time; the database stores its hash.
#[derive(Debug, Clone)]
pub struct ApiKeyData {
    pub api_key_id: Uuid,
    pub key: String,
    pub hash: Vec<u8>,
}

impl ApiKeyData {
    pub fn new() -> Self {
        let api_key_id = Uuid::now_v7();
        let secret = Uuid::new_v4();
        let key = format!("{KEY_PREFIX}{}.{}", api_key_id.simple(), secret.simple());
        let hash = hash_key(&key);

        Self {
            api_key_id,
            key,
            hash,
        }
    }
}

impl Default for ApiKeyData {
    fn default() -> Self {
        Self::new()
    }
}

pub fn hash_key(key: &str) -> Vec<u8> {
    Sha256::digest(key.as_bytes()).to_vec()
}

/// Split a presented key into its id and the hash to look up. Returns None when the key
/// doesn't have the expected shape.
pub fn parse_key(key: &str) -> Option<(Uuid, Vec<u8>)> {
    let rest = key.strip_prefix(KEY_PREFIX)?;
    let (id, _secret) = rest.split_once('.')?;
    let id = Uuid::try_parse(id).ok()?;
    Some((id, hash_key(key)))
}

/// The database-side representation of an API key.
#[derive(Debug, Clone)]
pub struct ApiKey {
    pub id: Uuid,
    pub user_id: UserId,
    pub description: String,
    pub active: bool,
    pub expires_at: DateTime<Utc>,
}

pub async fn add_api_key(
    db: impl PgExecutor<'_>,
    key: &ApiKey,
    hash: &[u8],
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO api_keys (id, user_id, key_hash, description, active, expires_at)
        VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(key.id)
    .bind(key.user_id.as_uuid())
    .bind(hash)
    .bind(&key.description)
    .bind(key.active)
    .bind(key.expires_at)
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_generated_key() {
        let data = ApiKeyData::new();
        let (id, hash) = parse_key(&data.key).unwrap();
        assert_eq!(id, data.api_key_id);
        assert_eq!(hash, data.hash);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(parse_key("").is_none());
        assert!(parse_key("apk-missing-dot").is_none());
        assert!(parse_key("wrong-prefix.secret").is_none());

        let data = ApiKeyData::new();
        assert!(parse_key(data.key.trim_start_matches("apk-")).is_none());
    }

    #[test]
    fn different_secrets_hash_differently() {
        let a = ApiKeyData::new();
        let b = ApiKeyData::new();
        assert_ne!(a.hash, b.hash);
    }
}
