//! Responder - CLI Entry Point

use anyhow::Result;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use responder::{Responder, ServerConfig};
use std::path::PathBuf;
use tracing::{error, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "responder",
    about = "HTTP stub server - answers every POST with a fixed status, body and delay",
    version,
    disable_help_flag = true
)]
struct Args {
    /// Host name or address to listen on
    #[arg(short = 'h', long)]
    host: String,

    /// Port to listen on
    #[arg(short = 'p', long)]
    port: u16,

    /// Delay before each response, in seconds
    #[arg(short = 'd', long = "delay", value_name = "SECONDS")]
    delay: u64,

    /// HTTP status code to respond with
    #[arg(short = 'c', long = "code", value_name = "STATUS")]
    code: u16,

    /// File whose contents are sent as the response body
    #[arg(short = 'v', long = "body", value_name = "FILE")]
    body: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,

    /// Print help
    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = match ServerConfig::new(args.host, args.port, args.delay, args.code, args.body) {
        Ok(config) => config,
        Err(e) => Args::command().error(ErrorKind::ValueValidation, e).exit(),
    };

    if args.print_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    let responder = Responder::start(config).await?;

    let handle = responder.shutdown_handle();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for interrupt");
            return;
        }
        println!("Shutting down");
        handle.shutdown();

        // A second interrupt abandons connections still waiting out their delay.
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!(stats = ?handle.stats(), "Interrupted again, abandoning in-flight connections");
            std::process::exit(0);
        }
    });

    let config = responder.config();
    println!("Responder is listening on {}.", responder.local_addr()?);
    println!("HTTP response code will be {}", config.status().as_u16());
    println!("HTTP response delay will be {} secs", config.delay_seconds());
    println!(
        "HTTP response will contain the contents of {}",
        config.body_path().display()
    );

    responder.serve_forever().await;

    Ok(())
}
