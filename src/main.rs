//! Xray sync - command line entry point.
//!
//! Usage:
//!   xray-sync [run|tests|epics|check-config] [--config <file>] [--on-error abort|continue]

use std::env;
use std::path::PathBuf;

use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use xray_sync_lib::config::{Config, OnError};
use xray_sync_lib::services::{SyncMode, SyncPipeline};

enum Command {
    Sync(SyncMode),
    CheckConfig,
}

fn print_usage() {
    println!("Usage: xray-sync [COMMAND] [OPTIONS]");
    println!();
    println!("Commands:");
    println!("  run            Update test runs from Nextworld, then epic summaries (default)");
    println!("  tests          Update test runs from Nextworld only");
    println!("  epics          Update epic test summaries only");
    println!("  check-config   Validate the configuration and print it");
    println!("  help           Show this help");
    println!();
    println!("Options:");
    println!("  --config, -c <file>    Read a legacy config.json (also XSYNC_CONFIG_FILE)");
    println!("  --on-error <policy>    abort or continue after a failed Nextworld lookup");
    println!("                         (also XSYNC_ON_ERROR)");
    println!();
    println!("Every other setting is read from XSYNC_* environment variables or .env.");
}

fn print_config(config: &Config) {
    let set = |present: bool| if present { "set" } else { "not set" };

    println!("Xray:");
    println!("  URL:              {}", config.xray.url);
    println!("  Client id:        {}", set(config.xray.client_id.is_some()));
    println!("  Client secret:    {}", set(config.xray.client_secret.is_some()));
    println!("  Suite link field: {}", config.xray.suite_link_field);
    println!("  Suite name field: {}", config.xray.suite_name_field);
    println!("  Test executions:  {}", config.xray.test_executions.join(", "));
    println!("Nextworld:");
    println!(
        "  URL:              {}",
        config.nextworld.url.as_deref().unwrap_or("not set")
    );
    println!("  Auth URL:         {}", config.nextworld.auth_url);
    println!(
        "  Zone:             {}",
        config.nextworld.zone.as_deref().unwrap_or("not set")
    );
    println!("  Credentials:      {}", set(config.nextworld.password.is_some()));
    println!("  Suite match:      {}", config.nextworld.suite_match);
    println!("  Token refresh:    every {} pages", config.nextworld.token_refresh_pages);
    println!("Jira:");
    println!("  URL:              {}", config.jira.url);
    println!("  Credentials:      {}", set(config.jira.api_token.is_some()));
    println!("  Projects:         {}", config.jira.projects.join(", "));
    println!(
        "  Current release:  {}",
        config.jira.current_release.as_deref().unwrap_or("not set")
    );
    println!("  Releasable %:     {}", config.jira.write_releasable_percent);
    println!("On error:           {}", config.on_error);
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        std::process::exit(1);
    }

    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let mut command = Command::Sync(SyncMode::Full);
    let mut config_file: Option<PathBuf> = None;
    let mut on_error: Option<OnError> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_file = Some(PathBuf::from(&args[i]));
                }
            }
            "--on-error" => {
                i += 1;
                on_error = args.get(i).and_then(|v| OnError::parse(v));
                if on_error.is_none() {
                    eprintln!("Error: --on-error must be 'abort' or 'continue'");
                    std::process::exit(1);
                }
            }
            "check-config" => command = Command::CheckConfig,
            "help" | "--help" | "-h" => {
                print_usage();
                return;
            }
            other => match SyncMode::parse(other) {
                Some(mode) => command = Command::Sync(mode),
                None => {
                    eprintln!("Unknown argument: {}", other);
                    print_usage();
                    std::process::exit(1);
                }
            },
        }
        i += 1;
    }

    // Load configuration
    let loaded = match config_file {
        Some(ref path) => Config::from_file(path),
        None => Config::load(),
    };
    let mut config = match loaded {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(policy) = on_error {
        config.on_error = policy;
    }

    let mode = match command {
        Command::CheckConfig => {
            print_config(&config);
            match config.validate_for(SyncMode::Full) {
                Ok(()) => println!("\nConfiguration is complete."),
                Err(e) => {
                    println!("\n{}", e);
                    std::process::exit(1);
                }
            }
            return;
        }
        Command::Sync(mode) => mode,
    };

    info!("========================================");
    info!("  Xray Sync ({})", mode);
    info!("========================================");

    let mut pipeline = match SyncPipeline::connect(&config, mode).await {
        Ok(p) => p,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };

    match pipeline.run(mode).await {
        Ok(summary) => println!("{}", summary),
        Err(e) => {
            error!("Sync failed: {}", e);
            std::process::exit(1);
        }
    }
}
