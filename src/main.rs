use std::process::exit;

use clap::Parser;
use color_eyre::eyre::Result;
use registry_client::RegistryClient;
use tracing::debug;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::args::Input;

mod cli;

#[tokio::main()]
async fn main() -> Result<()> {
    color_eyre::install()?;

    // Validate inputs
    let input = Input::parse();

    // Set up logging. Logs go to stderr so command output can be piped
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "registry_client={}",
            input.log_level.as_str().to_lowercase()
        ))
    });
    tracing_subscriber::registry()
        .with(fmt::layer().with_ansi(true).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    debug!("Logging initialized");

    // Create client
    let mut builder = RegistryClient::builder()
        .base_url(input.base_url.as_str())
        .auth_header(input.auth_header.as_str());
    if let Some(token) = &input.token {
        builder = builder.token(token.secret());
    }
    if let Some(timeout) = input.timeout {
        builder = builder.timeout(timeout.into());
    }
    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("{}", e.normalize());
            exit(1);
        }
    };

    match cli::commands::run(&client, input.command).await {
        Ok(output) => {
            if !output.is_empty() {
                println!("{output}");
            }
            Ok(())
        }
        Err(e) => {
            debug!("Command failed: {e:?}");
            eprintln!("{}", e.normalize());
            exit(1);
        }
    }
}
