// src/main.rs

//! The main entry point for the exporter.

use anyhow::Result;
use spinel_exporter::config::Config;
use spinel_exporter::server;
use std::env;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("spinel-exporter version {VERSION}");
        return Ok(());
    }

    // Without --config the built-in defaults are used.
    let config_path = flag_value(&args, "--config");
    let mut config = match config_path {
        Some(path) => match Config::from_file(path) {
            Ok(cfg) => cfg,
            Err(e) => {
                eprintln!("Failed to load configuration from \"{path}\": {e:#}");
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };

    if let Some(listen) = flag_value(&args, "--listen") {
        config.listen_address = listen.to_string();
        if let Err(e) = config.validate() {
            eprintln!("Invalid --listen value: {e:#}");
            std::process::exit(1);
        }
    }

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    info!("Starting spinel-exporter v{}", VERSION);

    if let Err(e) = server::run(config).await {
        error!("Exporter runtime error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}
