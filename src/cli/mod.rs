pub mod chat;
pub mod code;
pub mod config;
pub mod serve;

use clap::{Args, Parser, Subcommand};

use crate::types::{ExtraOptions, GenerationParameters, LOCATIONS};

/// A3S Playground - Chat relay for OpenAI-compatible completion APIs
#[derive(Debug, Parser)]
#[command(name = "a3s-playground", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the relay server
    Serve {
        /// Host address to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Port to listen on (overrides the config file)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Chat with the model through a running relay
    Chat {
        /// Relay server root URL
        #[arg(long, default_value = "http://127.0.0.1:11436")]
        relay: String,

        /// Send a single prompt instead of starting interactive mode
        #[arg(long)]
        prompt: Option<String>,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Print a code sample that sends a prompt to the upstream API directly
    Code {
        /// Sample language: javascript, python or curl
        #[arg(long, short, default_value = "curl")]
        language: String,

        /// User message to include in the sample
        #[arg(long)]
        prompt: String,

        /// Model to put in the sample (defaults to the configured model)
        #[arg(long)]
        model: Option<String>,

        #[command(flatten)]
        generation: GenerationArgs,
    },

    /// Show the effective configuration
    Config {
        /// Write the default configuration file if none exists
        #[arg(long)]
        init: bool,
    },
}

/// Generation controls shared by `chat` and `code`.
#[derive(Debug, Clone, Args)]
pub struct GenerationArgs {
    /// Sampling temperature (0.0 to 2.0)
    #[arg(long, default_value_t = 1.0, value_parser = parse_temperature)]
    pub temperature: f64,

    /// Maximum tokens to generate (1 to 4096)
    #[arg(long, default_value_t = 1024, value_parser = clap::value_parser!(u32).range(1..=4096))]
    pub max_tokens: u32,

    /// Wait for the whole reply instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Let the model search the web before answering
    #[arg(long)]
    pub online_search: bool,

    /// Search location
    #[arg(long, default_value = "global", value_parser = clap::builder::PossibleValuesParser::new(LOCATIONS))]
    pub location: String,

    /// Tone or system prompt passed through to the upstream
    #[arg(long)]
    pub tone: Option<String>,
}

impl GenerationArgs {
    pub fn to_parameters(&self) -> GenerationParameters {
        GenerationParameters {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: !self.no_stream,
            extra: ExtraOptions {
                online_search: self.online_search,
                location: self.location.clone(),
                tone: self.tone.clone(),
                ..Default::default()
            },
        }
    }
}

fn parse_temperature(s: &str) -> std::result::Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=2.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("temperature must be between 0 and 2, got {value}"))
    }
}
