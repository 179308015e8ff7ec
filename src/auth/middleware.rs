//! Request authentication and per-route permission gates.
//!
//! [AuthLayer] resolves the caller's credentials once per request and stashes the
//! resulting [AuthInfo] in the request extensions. The permission gates are route layers
//! that inspect that extension, so they run after routing but before the handler.

use std::{
    future::Future,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    extract::Request,
    http::header,
    response::{IntoResponse, Response},
};
use futures::future::{ready, Either, Ready};
use sqlx::PgPool;
use tower::{Layer, Service};
use tower_cookies::Cookie;
use uuid::Uuid;

use super::{
    api_keys,
    sessions::{ExpiryStyle, SessionKey, SESSION_COOKIE_NAME},
    AuthError, AuthInfo,
};
use crate::Error;

pub struct AuthQueries {
    db: PgPool,
    session_expiry: ExpiryStyle,
}

impl AuthQueries {
    pub fn new(db: PgPool, session_expiry: ExpiryStyle) -> Self {
        Self { db, session_expiry }
    }

    pub async fn get_user_by_api_key(
        &self,
        api_key_id: Uuid,
        hash: &[u8],
    ) -> Result<Option<AuthInfo>, sqlx::Error> {
        sqlx::query_as::<_, AuthInfo>(
            "SELECT u.id AS user_id, u.is_admin, u.active
            FROM api_keys k
            JOIN users u ON u.id = k.user_id
            WHERE k.id = $1 AND k.key_hash = $2 AND k.active AND k.expires_at > now()",
        )
        .bind(api_key_id)
        .bind(hash)
        .fetch_optional(&self.db)
        .await
    }

    pub async fn get_user_by_session_key(
        &self,
        key: &SessionKey,
    ) -> Result<Option<AuthInfo>, sqlx::Error> {
        match self.session_expiry {
            ExpiryStyle::FromCreation(_) => {
                sqlx::query_as::<_, AuthInfo>(
                    "SELECT u.id AS user_id, u.is_admin, u.active
                    FROM sessions s
                    JOIN users u ON u.id = s.user_id
                    WHERE s.id = $1 AND s.key_hash = $2 AND s.expires_at > now()",
                )
                .bind(key.session_id)
                .bind(key.hash())
                .fetch_optional(&self.db)
                .await
            }
            ExpiryStyle::AfterIdle(duration) => {
                sqlx::query_as::<_, AuthInfo>(
                    "WITH touched AS (
                        UPDATE sessions
                        SET expires_at = now() + $3 * interval '1 second'
                        WHERE id = $1 AND key_hash = $2 AND expires_at > now()
                        RETURNING user_id
                    )
                    SELECT u.id AS user_id, u.is_admin, u.active
                    FROM touched
                    JOIN users u ON u.id = touched.user_id",
                )
                .bind(key.session_id)
                .bind(key.hash())
                .bind(duration.as_secs_f64())
                .fetch_optional(&self.db)
                .await
            }
        }
    }
}

async fn resolve_request_auth(
    queries: &AuthQueries,
    bearer: Option<&str>,
    session_key: Option<SessionKey>,
) -> Result<AuthInfo, Error> {
    if let Some(token) = bearer {
        // A presented credential that doesn't check out is an error, not a fallback to
        // anonymous.
        let (api_key_id, hash) =
            api_keys::parse_key(token).ok_or(Error::AuthError(AuthError::InvalidApiKey))?;

        let info = queries
            .get_user_by_api_key(api_key_id, &hash)
            .await
            .map_err(|error| {
                tracing::error!(%error, "API key lookup failed");
                Error::AuthSubsystem
            })?;

        return info.ok_or(Error::AuthError(AuthError::InvalidApiKey));
    }

    if let Some(key) = session_key {
        let info = queries
            .get_user_by_session_key(&key)
            .await
            .map_err(|error| {
                tracing::error!(%error, "session lookup failed");
                Error::AuthSubsystem
            })?;

        // An expired or deleted session just means the browser is logged out.
        if let Some(info) = info {
            return Ok(info);
        }
    }

    Ok(AuthInfo::anonymous())
}

fn session_key_from_headers(req: &Request) -> Option<SessionKey> {
    for value in req.headers().get_all(header::COOKIE) {
        let Ok(value) = value.to_str() else {
            continue;
        };

        for cookie in Cookie::split_parse(value) {
            let Ok(cookie) = cookie else {
                continue;
            };

            if cookie.name() == SESSION_COOKIE_NAME {
                return SessionKey::from_cookie_value(cookie.value());
            }
        }
    }

    None
}

/// Resolves the caller's identity before the request reaches the router.
#[derive(Clone)]
pub struct AuthLayer {
    queries: Arc<AuthQueries>,
}

impl AuthLayer {
    pub fn new(queries: Arc<AuthQueries>) -> Self {
        Self { queries }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthService {
            inner,
            queries: self.queries.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthService<S> {
    inner: S,
    queries: Arc<AuthQueries>,
}

impl<S> Service<Request> for AuthService<S>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Response, S::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request) -> Self::Future {
        let queries = self.queries.clone();
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let bearer = req
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::to_owned);
        let session_key = session_key_from_headers(&req);

        Box::pin(async move {
            match resolve_request_auth(&queries, bearer.as_deref(), session_key).await {
                Ok(info) => {
                    req.extensions_mut().insert(Arc::new(info));
                    inner.call(req).await
                }
                Err(e) => Ok(e.into_response()),
            }
        })
    }
}

#[derive(Clone, Copy, Debug)]
enum Gate {
    LoggedIn,
    Admin,
}

fn check_gate(info: Option<&Arc<AuthInfo>>, gate: Gate) -> Result<(), AuthError> {
    let Some(info) = info else {
        return Err(AuthError::Unauthenticated);
    };

    info.check_valid()?;

    match gate {
        Gate::LoggedIn => Ok(()),
        Gate::Admin => {
            if info.is_admin {
                Ok(())
            } else {
                Err(AuthError::MissingPermission("admin"))
            }
        }
    }
}

/// Route layer requiring an active admin user.
pub fn admin_required() -> RequireGateLayer {
    RequireGateLayer { gate: Gate::Admin }
}

/// Route layer requiring any active, non-anonymous user.
pub fn login_required() -> RequireGateLayer {
    RequireGateLayer {
        gate: Gate::LoggedIn,
    }
}

#[derive(Clone)]
pub struct RequireGateLayer {
    gate: Gate,
}

impl<S> Layer<S> for RequireGateLayer {
    type Service = RequireGate<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequireGate {
            inner,
            gate: self.gate,
        }
    }
}

#[derive(Clone)]
pub struct RequireGate<S> {
    inner: S,
    gate: Gate,
}

impl<S> Service<Request> for RequireGate<S>
where
    S: Service<Request, Response = Response>,
{
    type Response = Response;
    type Error = S::Error;
    type Future = Either<S::Future, Ready<Result<Response, S::Error>>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request) -> Self::Future {
        match check_gate(req.extensions().get::<Arc<AuthInfo>>(), self.gate) {
            Ok(()) => Either::Left(self.inner.call(req)),
            Err(e) => Either::Right(ready(Ok(Error::from(e).into_response()))),
        }
    }
}
