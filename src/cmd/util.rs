use clap::{Args, Subcommand};
use error_stack::Report;

use crate::{auth::password, Error};

#[derive(Args, Debug)]
pub struct UtilCommand {
    #[clap(subcommand)]
    pub command: UtilSubcommand,
}

#[derive(Debug, Subcommand)]
pub enum UtilSubcommand {
    /// Print the Argon2 hash for a password
    HashPassword(HashPasswordCommand),
}

#[derive(Args, Debug)]
pub struct HashPasswordCommand {
    password: String,
}

impl UtilCommand {
    pub async fn handle(self) -> Result<(), Report<Error>> {
        match self.command {
            UtilSubcommand::HashPassword(password) => {
                let hash = password::new_hash(password.password).await?.0;
                println!("{hash}");
            }
        }

        Ok(())
    }
}
