use std::io::IsTerminal;

use clap::{Args, Subcommand};
use error_stack::{Report, ResultExt};
use sqlx::PgPool;

use crate::{auth::password, Error};

#[derive(Args, Debug)]
pub struct DbCommand {
    /// The PostgreSQL database to connect to
    #[clap(long = "db", env = "DATABASE_URL")]
    database_url: String,

    #[clap(subcommand)]
    pub command: DbSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum DbSubcommand {
    /// Create the initial admin user in the database.
    Bootstrap(BootstrapCommand),
    /// Update the database with the latest migrations
    Migrate,
}

impl DbCommand {
    pub async fn handle(self) -> Result<(), Report<Error>> {
        let pg_pool = sqlx::PgPool::connect(&self.database_url)
            .await
            .change_context(Error::Db)?;

        match self.command {
            DbSubcommand::Bootstrap(cmd) => cmd.handle(pg_pool).await,
            DbSubcommand::Migrate => crate::db::run_migrations(&pg_pool).await,
        }
    }
}

#[derive(Args, Debug)]
/// Add an initial admin user to the database
pub struct BootstrapCommand {
    /// The email for the admin user
    #[clap(long = "email", env = "BOOTSTRAP_ADMIN_EMAIL")]
    admin_email: Option<String>,

    /// The name for the admin user
    /// Defaults to "Admin"
    #[clap(long = "name", env = "BOOTSTRAP_ADMIN_NAME")]
    admin_name: Option<String>,

    /// A password for the admin user, prehashed with Argon2. The `util hash-password`
    /// subcommand can be used to generate a password hash if you don't have one already.
    #[clap(
        long = "password-hash",
        env = "BOOTSTRAP_ADMIN_PASSWORD_HASH",
        conflicts_with = "admin_password"
    )]
    admin_password_hash: Option<String>,

    /// A plain-text password for the admin user.
    #[clap(
        long = "password",
        env = "BOOTSTRAP_ADMIN_PASSWORD",
        conflicts_with = "admin_password_hash"
    )]
    admin_password: Option<String>,

    /// Force adding the admin user even if the database already contains users.
    #[clap(long, env = "BOOTSTRAP_FORCE")]
    force: bool,
}

fn ask_question(prompt: &str) -> Option<String> {
    if !std::io::stdin().is_terminal() {
        return None;
    }

    let answer = dialoguer::Input::<String>::new()
        .with_prompt(prompt)
        .interact_text()
        .unwrap();

    Some(answer)
}

impl BootstrapCommand {
    pub async fn handle(self, pg_pool: PgPool) -> Result<(), Report<Error>> {
        let admin_email = self
            .admin_email
            .or_else(|| ask_question("What email should the admin user have"))
            .ok_or(Error::Config)
            .attach_printable("Admin email is required")?;

        let password = match (self.admin_password_hash, self.admin_password) {
            (Some(hash), _) => Some(password::HashedPassword(hash)),
            (None, Some(pass)) => Some(password::new_hash(pass).await?),
            (None, None) => {
                let password = if std::io::stdin().is_terminal() {
                    dialoguer::Password::new()
                        .allow_empty_password(true)
                        .with_prompt(
                            "What password should the admin user have? You may leave this blank",
                        )
                        .with_confirmation("Confirm password", "Passwords do not match")
                        .interact()
                        .ok()
                } else {
                    None
                };

                match password {
                    Some(password) if !password.is_empty() => {
                        Some(password::new_hash(password).await?)
                    }
                    _ => None,
                }
            }
        };

        let admin_name = self
            .admin_name
            .or_else(|| ask_question("What name should the admin user have"));

        let data = crate::db::BootstrapData {
            force: self.force,
            admin_email,
            admin_name,
            admin_password: password,
        };

        let bootstrapped = crate::db::bootstrap(pg_pool, data).await?;
        if bootstrapped {
            println!("Bootstrapped database");
        } else {
            println!("Database already bootstrapped");
        }

        Ok(())
    }
}
