use clap::Parser;
use error_stack::Report;

use airport_api::{cmd, tracing_config, Error};

fn main() -> Result<(), Report<Error>> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(actual_main())
}

async fn actual_main() -> Result<(), Report<Error>> {
    error_stack::Report::set_color_mode(error_stack::fmt::ColorMode::None);

    let mut cli = cmd::Cli::parse();
    if !cli.no_dotenv {
        dotenvy::dotenv().ok();
        // Reread with the environment variables in place
        cli = cmd::Cli::parse();
    }

    tracing_config::init();

    cmd::run(cli).await
}
