use std::sync::Arc;

use axum::{
    extract::State,
    http::{request::Parts, StatusCode},
    response::IntoResponse,
    routing,
};
use axum_jsonschema::Json;
use error_stack::ResultExt;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;
use tower_cookies::{Cookie, Cookies};

use crate::{server::ServerState, users::UserId, Error};

pub mod api_keys;
pub mod middleware;
pub mod password;
pub mod sessions;

pub use middleware::{admin_required, login_required, AuthLayer, AuthQueries};
pub use sessions::{ExpiryStyle, SessionCookieBuilder, SESSION_COOKIE_NAME};

#[derive(Debug, ThisError)]
pub enum AuthError {
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("User is disabled")]
    Disabled,
    #[error("Invalid API key")]
    InvalidApiKey,
    #[error("Missing permission {0}")]
    MissingPermission(&'static str),
}

impl AuthError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::Disabled => "disabled",
            AuthError::InvalidApiKey => "invalid_api_key",
            AuthError::MissingPermission(_) => "missing_permission",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Unauthenticated => StatusCode::UNAUTHORIZED,
            AuthError::Disabled => StatusCode::FORBIDDEN,
            AuthError::InvalidApiKey => StatusCode::UNAUTHORIZED,
            AuthError::MissingPermission(_) => StatusCode::FORBIDDEN,
        }
    }
}

/// The identity resolved for the current request.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AuthInfo {
    /// The user id of this user
    pub user_id: UserId,
    /// If this user has the admin role
    pub is_admin: bool,
    /// If this user is enabled
    pub active: bool,
    /// True if no credentials were presented with the request
    #[sqlx(default)]
    pub anonymous: bool,
}

impl AuthInfo {
    pub fn anonymous() -> Self {
        Self {
            user_id: UserId::from_uuid(uuid::Uuid::nil()),
            is_admin: false,
            active: false,
            anonymous: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        !self.anonymous
    }

    pub fn check_valid(&self) -> Result<(), AuthError> {
        if self.anonymous {
            Err(AuthError::Unauthenticated)
        } else if !self.active {
            Err(AuthError::Disabled)
        } else {
            Ok(())
        }
    }
}

/// Extractor for handlers that require an active, logged-in user.
#[derive(Debug, Clone)]
pub struct Authed(Arc<AuthInfo>);

impl std::ops::Deref for Authed {
    type Target = AuthInfo;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for Authed
where
    S: Send + Sync,
{
    type Rejection = Error;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let info = parts
            .extensions
            .get::<Arc<AuthInfo>>()
            .cloned()
            .ok_or(Error::AuthSubsystem)?;

        info.check_valid()?;

        Ok(Authed(info))
    }
}

#[derive(Deserialize, Debug, JsonSchema)]
pub struct LoginPayload {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, Debug, JsonSchema)]
pub struct LoginResponse {
    pub user_id: UserId,
}

#[derive(sqlx::FromRow)]
struct LoginUserRow {
    id: UserId,
    password_hash: Option<String>,
    active: bool,
}

async fn login(
    State(state): State<ServerState>,
    cookies: Cookies,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse, Error> {
    let user = sqlx::query_as::<_, LoginUserRow>(
        "SELECT id, password_hash, active FROM users WHERE lower(email) = lower($1)",
    )
    .bind(&payload.email)
    .fetch_optional(&state.db)
    .await
    .change_context(Error::Db)?;

    // Same error for a missing user and a wrong password.
    let Some(user) = user else {
        return Err(Error::Login);
    };
    let Some(hash) = user.password_hash else {
        return Err(Error::Login);
    };

    if !password::verify_password(hash, payload.password).await? {
        return Err(Error::Login);
    }

    if !user.active {
        return Err(Error::AuthError(AuthError::Disabled));
    }

    let key = sessions::create_session(&state.db, user.id, state.session_expiry)
        .await
        .change_context(Error::AuthSubsystem)?;

    cookies.add(
        state
            .cookie_builder
            .create_cookie(&key, state.session_expiry.expiry_duration()),
    );

    Ok(Json(LoginResponse { user_id: user.id }))
}

async fn logout(
    State(state): State<ServerState>,
    cookies: Cookies,
) -> Result<impl IntoResponse, Error> {
    if let Some(cookie) = cookies.get(SESSION_COOKIE_NAME) {
        if let Some(key) = sessions::SessionKey::from_cookie_value(cookie.value()) {
            sessions::delete_session(&state.db, key.session_id)
                .await
                .change_context(Error::AuthSubsystem)?;
        }
    }

    cookies.remove(Cookie::build((SESSION_COOKIE_NAME, "")).path("/").build());

    Ok(StatusCode::OK)
}

pub fn create_routes() -> axum::Router<ServerState> {
    axum::Router::new()
        .route("/auth/login", routing::post(login))
        .route("/auth/logout", routing::post(logout))
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::tests::{start_app, BootstrappedData};

    #[sqlx::test]
    async fn login_and_logout(pool: sqlx::PgPool) {
        let (app, BootstrappedData { user, .. }) = start_app(pool).await;

        // The harness base client has no API key, so it only has the session cookie to
        // work with.
        let client = &app.client;

        // Not logged in yet
        let response = client.get("users/me").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        let login: serde_json::Value = client
            .post("auth/login")
            .json(&json!({ "email": user.email, "password": user.password }))
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(login["user_id"].as_str().unwrap(), user.user_id.to_string());

        let me: serde_json::Value = client
            .get("users/me")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(me["email"], user.email);

        client
            .post("auth/logout")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();

        let response = client.get("users/me").send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn login_rejects_bad_credentials(pool: sqlx::PgPool) {
        let (app, BootstrappedData { user, .. }) = start_app(pool).await;

        let response = app
            .client
            .post("auth/login")
            .json(&json!({ "email": user.email, "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        let response = app
            .client
            .post("auth/login")
            .json(&json!({ "email": "nobody@example.com", "password": "wrong" }))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[sqlx::test]
    async fn invalid_api_key_is_rejected(pool: sqlx::PgPool) {
        let (app, BootstrappedData { user, .. }) = start_app(pool).await;

        // Well-formed but unknown key
        let unknown = crate::auth::api_keys::ApiKeyData::new();
        let response = app
            .client
            .with_api_key(&unknown.key)
            .get("users/me")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        // Malformed key
        let response = app
            .client
            .with_api_key("garbage")
            .get("users/me")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNAUTHORIZED);

        // The real key still works
        user.client
            .get("users/me")
            .send()
            .await
            .unwrap()
            .error_for_status()
            .unwrap();
    }
}
