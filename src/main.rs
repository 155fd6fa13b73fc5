use clap::Parser;
use tracing_subscriber::EnvFilter;

use a3s_playground::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { host, port } => {
            a3s_playground::cli::serve::execute(host, port).await?;
        }
        Commands::Chat {
            relay,
            prompt,
            generation,
        } => {
            a3s_playground::cli::chat::execute(&relay, prompt.as_deref(), generation.to_parameters())
                .await?;
        }
        Commands::Code {
            language,
            prompt,
            model,
            generation,
        } => {
            a3s_playground::cli::code::execute(
                &language,
                &prompt,
                model.as_deref(),
                &generation.to_parameters(),
            )?;
        }
        Commands::Config { init } => {
            a3s_playground::cli::config::execute(init)?;
        }
    }

    Ok(())
}
