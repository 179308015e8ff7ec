use error_stack::{Report, ResultExt};
use sqlx::PgPool;

use crate::{
    auth::password::HashedPassword,
    users::{queries::create_new_user_with_prehashed_password, UserCreatePayload, UserId},
    Error,
};

/// Run the database migrations, if needed
pub async fn run_migrations(db: &PgPool) -> Result<(), Report<Error>> {
    sqlx::migrate!().run(db).await.change_context(Error::Db)
}

/// Arguments to the [bootstrap] function.
#[derive(Debug, Default)]
pub struct BootstrapData {
    /// If false, don't do anything if the database already contains at least one user.
    /// If true, try to add the admin user regardless of what's in the database right now.
    pub force: bool,
    /// The email for the admin user
    pub admin_email: String,
    /// The name of the admin user, or "Admin" if omitted
    pub admin_name: Option<String>,
    /// The hashed password for the admin user.
    pub admin_password: Option<HashedPassword>,
}

/// Bootstrap the database, adding an administrator user.
pub async fn bootstrap(db: PgPool, data: BootstrapData) -> Result<bool, Report<Error>> {
    let mut tx = db.begin().await.change_context(Error::Db)?;

    if !data.force {
        let any_exists = sqlx::query_scalar::<_, bool>("SELECT true FROM users LIMIT 1")
            .fetch_optional(&mut *tx)
            .await
            .change_context(Error::Db)?
            .is_some();

        if any_exists {
            return Ok(false);
        }
    }

    let admin_user_id = UserId::new();

    let user_details = UserCreatePayload {
        email: data.admin_email,
        name: data.admin_name.unwrap_or_else(|| "Admin".to_string()),
        is_admin: true,
    };

    create_new_user_with_prehashed_password(
        &mut *tx,
        admin_user_id,
        user_details,
        data.admin_password,
    )
    .await?;

    tx.commit().await.change_context(Error::Db)?;

    Ok(true)
}
