use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use griddash::config::{self, Config, ConfigError};
use griddash::widget::{instantiate, WidgetRegistry, WidgetSet};

// Default Configuration Constants
/// Default log level when not specified
const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log file path (no logging to file)
const DEFAULT_LOG_FILE: &str = "/dev/null";

#[derive(Parser)]
#[command(name = "griddash")]
#[command(
    about = "Grid-based terminal dashboard",
    long_about = "Grid-based terminal dashboard\n\nIf no command is specified, the dashboard starts in interactive mode."
)]
struct Cli {
    /// Configuration file (default: XDG config directory)
    #[arg(short = 'c', long, global = true)]
    config: Option<PathBuf>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, global = true, default_value = DEFAULT_LOG_LEVEL)]
    log_level: String,

    /// Log file path (default: /dev/null for no logging)
    #[arg(short = 'F', long, global = true, default_value = DEFAULT_LOG_FILE)]
    log_file: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Display the configuration and the resolved widget layout
    Config,
    /// Write the default configuration if none exists
    Init,
}

fn init_logging(log_level: &str, log_file: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(config::expand_home(log_file))
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Failed to open log file {}: {}", log_file, e);
            return;
        }
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Resolve log configuration from CLI args and config file
/// CLI arguments take precedence over config file
fn resolve_log_config<'a>(cli: &'a Cli, config: &'a Config) -> (&'a str, &'a str) {
    let log_level = if cli.log_level != DEFAULT_LOG_LEVEL {
        cli.log_level.as_str()
    } else {
        config.log_level.as_str()
    };

    let log_file = if cli.log_file != DEFAULT_LOG_FILE {
        cli.log_file.as_str()
    } else {
        config.log_file.as_str()
    };

    (log_level, log_file)
}

/// Load the configuration or exit with a message the user can act on
fn load_or_exit(path: &Path) -> Config {
    match config::load(path) {
        Ok(cfg) => cfg,
        Err(e @ ConfigError::Missing { .. }) => {
            eprintln!("{}", e);
            eprintln!("Run `griddash init` to create a default configuration.");
            std::process::exit(1);
        }
        Err(e @ ConfigError::Syntax { .. }) => {
            eprintln!("{}", e);
            eprintln!("Fix the configuration file and start again.");
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Failed to read configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn instantiate_or_exit(cfg: &Config) -> WidgetSet {
    match instantiate(cfg, &WidgetRegistry::with_builtin()) {
        Ok(set) => set,
        Err(e) => {
            tracing::error!("CONFIG: {}", e);
            eprintln!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    }
}

/// Handle the config command - display configuration and resolved layout
fn handle_config_command(path: &Path) {
    let exists = path.exists();
    println!("Configuration File: {} (Exists: {})", path.display(), if exists { "yes" } else { "no" });
    if !exists {
        return;
    }

    let cfg = load_or_exit(path);
    let set = instantiate_or_exit(&cfg);

    println!();
    println!("Current Configuration:");
    println!("=====================");
    println!("log_level: {}", cfg.log_level);
    println!("log_file: {}", cfg.log_file);
    println!("refresh_interval: {} seconds", cfg.refresh_interval);
    println!("fetch_timeout: {} seconds", cfg.fetch_timeout);
    println!();
    println!("[grid]");
    println!("columns: {:?}", cfg.grid.columns);
    println!("rows: {:?}", cfg.grid.rows);
    println!();
    println!("Widgets:");
    for instance in &set.instances {
        let rect = instance.rect();
        println!(
            "  {} ({}): rows {}..{}, columns {}..{}, every {}s",
            instance.name(),
            instance.config().kind,
            rect.top,
            rect.bottom(),
            rect.left,
            rect.right(),
            instance.config().refresh_interval.as_secs()
        );
    }

    if !set.warnings.is_empty() {
        println!();
        println!("Warnings:");
        for warning in &set.warnings {
            println!("  {}", warning);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Commands::Init) = cli.command {
        let path = match &cli.config {
            Some(path) => {
                config::ensure_config_at(path)?;
                path.clone()
            }
            None => {
                config::migrate_legacy_dir();
                config::ensure_default_config()?
            }
        };
        println!("Configuration File: {}", path.display());
        return Ok(());
    }

    let path = match &cli.config {
        Some(path) => path.clone(),
        None => {
            config::migrate_legacy_dir();
            match cli.command {
                Some(Commands::Config) => config::config_path()?,
                _ => config::ensure_default_config()?,
            }
        }
    };

    if let Some(Commands::Config) = cli.command {
        handle_config_command(&path);
        return Ok(());
    }

    let cfg = load_or_exit(&path);

    // Resolve and initialize logging
    let (log_level, log_file) = resolve_log_config(&cli, &cfg);
    if log_file != DEFAULT_LOG_FILE {
        init_logging(log_level, log_file);
    }
    tracing::info!("CONFIG: loaded {}", path.display());

    let widgets = instantiate_or_exit(&cfg);
    griddash::tui::run(&cfg, widgets)
        .await
        .context("Error running TUI")
}
