use std::time::Duration;

use sha2::{Digest, Sha256};
use sqlx::PgExecutor;
use tower_cookies::{
    cookie::{time, SameSite},
    Cookie,
};
use uuid::Uuid;

use crate::users::UserId;

pub const SESSION_COOKIE_NAME: &str = "sid";

/// When user sessions expire.
#[derive(Debug, Clone, Copy)]
pub enum ExpiryStyle {
    /// A fixed lifetime from session creation.
    FromCreation(Duration),
    /// Expiry is pushed out on every authenticated request.
    AfterIdle(Duration),
}

impl ExpiryStyle {
    pub fn expiry_duration(&self) -> Duration {
        match self {
            ExpiryStyle::FromCreation(duration) => *duration,
            ExpiryStyle::AfterIdle(duration) => *duration,
        }
    }
}

/// The client-side half of a session: the session row id and the secret key whose hash is
/// stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionKey {
    pub session_id: Uuid,
    pub key: Uuid,
}

impl SessionKey {
    pub fn new() -> Self {
        Self {
            session_id: Uuid::now_v7(),
            key: Uuid::new_v4(),
        }
    }

    pub fn cookie_value(&self) -> String {
        format!("{}:{}", self.session_id, self.key)
    }

    pub fn from_cookie_value(value: &str) -> Option<Self> {
        let (session_id, key) = value.split_once(':')?;
        Some(Self {
            session_id: Uuid::try_parse(session_id).ok()?,
            key: Uuid::try_parse(key).ok()?,
        })
    }

    pub fn hash(&self) -> Vec<u8> {
        Sha256::digest(self.key.as_bytes()).to_vec()
    }
}

/// Builds the session cookie with the site's security settings applied.
#[derive(Debug, Clone)]
pub struct SessionCookieBuilder {
    secure: bool,
    same_site: SameSite,
}

impl SessionCookieBuilder {
    pub fn new(secure: bool, same_site: SameSite) -> Self {
        Self { secure, same_site }
    }

    pub fn create_cookie(&self, key: &SessionKey, expiry: Duration) -> Cookie<'static> {
        Cookie::build((SESSION_COOKIE_NAME, key.cookie_value()))
            .http_only(true)
            .secure(self.secure)
            .same_site(self.same_site)
            .path("/")
            .max_age(time::Duration::seconds(expiry.as_secs() as i64))
            .build()
    }
}

pub async fn create_session(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    expiry: ExpiryStyle,
) -> Result<SessionKey, sqlx::Error> {
    let key = SessionKey::new();

    sqlx::query(
        "INSERT INTO sessions (id, user_id, key_hash, expires_at)
        VALUES ($1, $2, $3, now() + $4 * interval '1 second')",
    )
    .bind(key.session_id)
    .bind(user_id.as_uuid())
    .bind(key.hash())
    .bind(expiry.expiry_duration().as_secs_f64())
    .execute(db)
    .await?;

    Ok(key)
}

pub async fn delete_session(db: impl PgExecutor<'_>, session_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM sessions WHERE id = $1")
        .bind(session_id)
        .execute(db)
        .await?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cookie_value_roundtrip() {
        let key = SessionKey::new();
        let parsed = SessionKey::from_cookie_value(&key.cookie_value()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn rejects_malformed_cookie_values() {
        assert!(SessionKey::from_cookie_value("").is_none());
        assert!(SessionKey::from_cookie_value("no-separator").is_none());
        assert!(SessionKey::from_cookie_value("not-a-uuid:also-not").is_none());
    }

    #[test]
    fn session_cookie_attributes() {
        let builder = SessionCookieBuilder::new(true, SameSite::Strict);
        let cookie = builder.create_cookie(&SessionKey::new(), Duration::from_secs(60));
        assert_eq!(cookie.name(), SESSION_COOKIE_NAME);
        assert_eq!(cookie.http_only(), Some(true));
        assert_eq!(cookie.secure(), Some(true));
        assert_eq!(cookie.path(), Some("/"));
    }
}
