use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use prospect_research::{
    cli::{describe_steps, execute_command, Cli, Commands},
    config::{Config, LogFormat},
    pipeline::default_steps,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Listing the built-in plan needs no credentials.
    if cli.command == Commands::Steps {
        println!("{}", describe_steps(&default_steps()));
        return Ok(());
    }

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        command = ?cli.command,
        "Prospect research starting..."
    );

    let result = execute_command(cli.command, &config).await;
    println!("{}", result.message);

    if result.exit_code != 0 {
        error!(exit_code = result.exit_code, "Command failed");
        std::process::exit(result.exit_code);
    }

    info!("Done");
    Ok(())
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
