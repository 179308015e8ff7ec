use clap::{Args, Parser, Subcommand};
use error_stack::{Report, ResultExt};

use crate::{
    auth::{ExpiryStyle, SessionCookieBuilder},
    server::{self, CorsSetting, ServerBind},
    Error,
};

pub mod db;
pub mod util;

#[derive(Debug, Parser)]
#[command(version, about)]
pub struct Cli {
    /// Do not read the .env file
    #[clap(long, global = true)]
    pub no_dotenv: bool,

    /// Server options, used when no subcommand is given.
    #[clap(flatten)]
    pub serve: ServeCommand,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Database management
    Db(db::DbCommand),
    /// Utilities
    Util(util::UtilCommand),
}

#[derive(Debug, Args)]
pub struct ServeCommand {
    /// The IP host to bind to
    #[clap(long, env = "HOST")]
    host: Option<String>,

    /// The TCP port to listen on
    #[clap(long, env = "PORT")]
    port: Option<u16>,

    /// The PostgreSQL database to connect to
    #[clap(long = "db", env = "DATABASE_URL")]
    database_url: Option<String>,

    /// The environment name, e.g. "development" or "production"
    #[clap(long, env = "ENV", default_value = "development")]
    env: String,

    /// Allow the session cookie over plain HTTP
    #[clap(long, env = "INSECURE")]
    insecure: bool,

    /// Request timeout, in seconds
    #[clap(long, env = "REQUEST_TIMEOUT", default_value_t = 60)]
    request_timeout: u64,

    /// Session idle expiry, in seconds
    #[clap(long, env = "SESSION_EXPIRY", default_value_t = 86400)]
    session_expiry: u64,

    /// Accept cross-origin requests from any origin
    #[clap(long, env = "CORS_ALLOW_ALL")]
    cors_allow_all: bool,

    /// Hosts to accept cross-origin requests from
    #[clap(long = "allowed-host", env = "ALLOWED_HOSTS", value_delimiter = ',')]
    allowed_hosts: Vec<String>,
}

impl ServeCommand {
    pub async fn handle(self) -> Result<(), Report<Error>> {
        let database_url = self
            .database_url
            .ok_or(Error::Config)
            .attach_printable("DATABASE_URL is required")?;

        let pg_pool = sqlx::PgPool::connect(&database_url)
            .await
            .change_context(Error::DbInit)?;

        let api_cors = if self.cors_allow_all {
            CorsSetting::AllowAll
        } else if !self.allowed_hosts.is_empty() {
            CorsSetting::AllowHostList
        } else {
            CorsSetting::None
        };

        let config = server::Config {
            env: self.env,
            bind: ServerBind::HostPort(
                self.host.unwrap_or_else(|| "127.0.0.1".to_string()),
                self.port.unwrap_or(8080),
            ),
            insecure: self.insecure,
            request_timeout: std::time::Duration::from_secs(self.request_timeout),
            pg_pool,
            cookie_configuration: SessionCookieBuilder::new(
                !self.insecure,
                tower_cookies::cookie::SameSite::Strict,
            ),
            session_expiry: ExpiryStyle::AfterIdle(std::time::Duration::from_secs(
                self.session_expiry,
            )),
            hosts: self.allowed_hosts,
            api_cors,
        };

        let server = server::create_server(config).await?;
        server.run().await
    }
}

pub async fn run(cli: Cli) -> Result<(), Report<Error>> {
    match cli.command {
        Some(Command::Db(cmd)) => cmd.handle().await,
        Some(Command::Util(cmd)) => cmd.handle().await,
        None => cli.serve.handle().await,
    }
}
