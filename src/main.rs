use clap::Parser;

use tallybot::cli::{self, Cli, Command, ConfigCommand};
use tallybot::{config, logging};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Command::Config(ConfigCommand::Path)) => cli::handle_config_path(),
        Some(Command::Config(ConfigCommand::Show)) => {
            cli::handle_config_show(&config::load_config()?)?
        }
        Some(Command::Version) => cli::handle_version(),
        Some(Command::Start { user, username }) => run(user, username).await?,
        None => run(1, None).await?,
    }

    Ok(())
}

async fn run(user: i64, username: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config::load_config()?;
    logging::init_tracing(&config.logging)?;
    cli::handle_start(config, user, username).await
}
