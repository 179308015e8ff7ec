use error_stack::{Report, ResultExt};
use sqlx::PgExecutor;
use tracing::instrument;

use super::{User, UserCreatePayload, UserId, UserSelfUpdatePayload};
use crate::{
    auth::password::{self, HashedPassword},
    Error,
};

#[instrument(skip(db))]
pub async fn get(db: impl PgExecutor<'_>, id: UserId) -> Result<User, Report<Error>> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, email, name, is_admin, active, created_at, updated_at
        FROM users WHERE id = $1",
    )
    .bind(id.as_uuid())
    .fetch_optional(db)
    .await
    .change_context(Error::Db)?
    .ok_or(Error::NotFound("User"))?;

    Ok(user)
}

/// Create a new user with an already-hashed password. Passing `None` creates a user that
/// can not log in with a password.
#[instrument(skip(db, password_hash))]
pub async fn create_new_user_with_prehashed_password(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    payload: UserCreatePayload,
    password_hash: Option<HashedPassword>,
) -> Result<User, Report<Error>> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (id, email, name, is_admin, password_hash)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, email, name, is_admin, active, created_at, updated_at",
    )
    .bind(user_id.as_uuid())
    .bind(&payload.email)
    .bind(&payload.name)
    .bind(payload.is_admin)
    .bind(password_hash.map(|h| h.0))
    .fetch_one(db)
    .await
    .map_err(|e| match crate::error::violated_constraint(&e) {
        Some("users_email_key") => {
            Report::new(e).change_context(Error::Validation("email is already in use".into()))
        }
        _ => Report::new(e).change_context(Error::Db),
    })?;

    Ok(user)
}

pub async fn create_new_user_with_plaintext_password(
    db: impl PgExecutor<'_>,
    user_id: UserId,
    payload: UserCreatePayload,
    password_plaintext: String,
) -> Result<User, Report<Error>> {
    let hash = password::new_hash(password_plaintext).await?;

    create_new_user_with_prehashed_password(db, user_id, payload, Some(hash)).await
}

#[instrument(skip(db, payload))]
pub async fn update_self(
    db: impl PgExecutor<'_>,
    id: UserId,
    payload: UserSelfUpdatePayload,
) -> Result<bool, Report<Error>> {
    let password_hash = match payload.password {
        Some(password) => Some(password::new_hash(password).await?.0),
        None => None,
    };

    let result = sqlx::query(
        "UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            password_hash = COALESCE($4, password_hash),
            updated_at = now()
        WHERE id = $1",
    )
    .bind(id.as_uuid())
    .bind(payload.name)
    .bind(payload.email)
    .bind(password_hash)
    .execute(db)
    .await
    .map_err(|e| match crate::error::violated_constraint(&e) {
        Some("users_email_key") => {
            Report::new(e).change_context(Error::Validation("email is already in use".into()))
        }
        _ => Report::new(e).change_context(Error::Db),
    })?;

    Ok(result.rows_affected() > 0)
}
