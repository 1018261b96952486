mod cli;

use docpress::{config, convert, fetch, notify, server, service};

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use std::sync::Arc;

async fn start_server(
    host: String,
    port: u16,
    config_path: Option<&std::path::Path>,
) -> Result<()> {
    // Load config
    let mut config = config::load_config_or_default(config_path)?;

    // Override host/port from CLI if specified
    config.server.host = host;
    config.server.port = port;

    tracing::info!("Starting docpress server");

    warn_if_converter_missing(&config.converter);

    let staging = convert::StagingArea::new(&config.staging.dir)?;
    tracing::info!("Staging directory: {}", staging.root().display());

    let supervisor = convert::ConverterSupervisor::new(config.converter.settings());
    let queue = convert::ConversionQueue::with_capacity(
        staging,
        supervisor,
        config.queue.cooldown(),
        config.queue.capacity,
    );

    let notifier = notify::CallbackNotifier::new(
        config.callback.secret.clone(),
        config.callback.timeout(),
    );

    let service = service::ConversionService::new(
        queue,
        Arc::new(fetch::HttpFetcher::new()),
        Arc::new(notifier),
        config.converter.deadline(),
        config.converter.max_deadline(),
    );

    server::start_server(config, service).await
}

fn warn_if_converter_missing(converter: &config::ConverterConfig) {
    if converter.program.is_absolute() {
        if !converter.program.exists() {
            tracing::warn!(
                "Converter executable not found: {}; conversions will fail to spawn",
                converter.program.display()
            );
        }
    } else if which::which(&converter.program).is_err() {
        tracing::warn!(
            "Converter '{}' not found in PATH; conversions will fail to spawn",
            converter.program.display()
        );
    }
}

fn check_tools(config_path: Option<&std::path::Path>) -> Result<()> {
    let config = config::load_config_or_default(config_path)?;
    let program = &config.converter.program;

    let resolved = if program.is_absolute() {
        program.exists().then(|| program.clone())
    } else {
        which::which(program).ok()
    };

    match resolved {
        Some(path) => {
            println!("converter: {} -> {}", program.display(), path.display());
            Ok(())
        }
        None => {
            println!("converter: {} -> NOT FOUND", program.display());
            anyhow::bail!("Converter executable is not available");
        }
    }
}

fn validate(config_path: Option<&std::path::Path>) -> Result<()> {
    match config_path {
        Some(path) => {
            let config = config::load_config(path)?;
            println!("Config OK: {:?}", path);
            tracing::debug!("Loaded config: {:?}", config);
        }
        None => {
            config::load_config_or_default(None)?;
            println!("Config OK (defaults)");
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    // Respect RUST_LOG env var if set, otherwise use defaults based on verbose flag
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if cli.verbose {
            "docpress=trace,tower_http=debug".to_string()
        } else {
            "docpress=debug,tower_http=info".to_string()
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(&env_filter)
        .init();

    match cli.command {
        Commands::Start { host, port } => {
            // Create tokio runtime
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(start_server(host, port, cli.config.as_deref()))
        }
        Commands::CheckTools => check_tools(cli.config.as_deref()),
        Commands::Validate {
            config: config_path,
        } => {
            let path = config_path.or(cli.config);
            validate(path.as_deref())
        }
        Commands::Version => {
            println!("docpress {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
