use anyhow::Context;
use blog_image_deduper_core::config::LogLevel;
use blog_image_deduper_core::{logging, Config, GroupingKey, ImageDeduper, RemovalOptions, ScanAction};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod server;

#[derive(Parser)]
#[command(name = "blog-image-deduper")]
#[command(about = "Find duplicate blog images and remove them without breaking posts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the admin HTTP endpoints
    Serve {
        /// Address to listen on (overrides the configuration)
        #[arg(long)]
        listen: Option<String>,

        /// Verbosity level
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Scan a storage folder for duplicate images
    Scan {
        /// Folder inside the bucket, e.g. "blog/2024-05"
        folder: String,

        /// Remove the duplicates instead of only reporting them
        #[arg(long)]
        remove: bool,

        /// Report removals without performing them
        #[arg(long)]
        dry_run: bool,

        /// Also remove blog-connected copies, keeping only the most recent
        #[arg(long)]
        no_keep_blog: bool,

        /// Group by normalized file name instead of content hash
        #[arg(long)]
        by_name: bool,

        /// Verbosity level
        #[arg(short, long, action = clap::ArgAction::Count)]
        verbose: u8,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Generate default configuration file
    GenerateConfig {
        /// Path to save configuration file
        #[arg(default_value = "blog-image-deduper.json")]
        path: PathBuf,
    },
}

fn load_config(path: Option<PathBuf>, verbose: u8) -> anyhow::Result<Config> {
    let mut config = match path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };
    config.apply_env();

    match verbose {
        0 => {}
        1 => config.log_level = LogLevel::Debug,
        _ => config.log_level = LogLevel::Trace,
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &Config) -> anyhow::Result<()> {
    match &config.log_dir {
        Some(dir) => logging::init_logger(dir, config.log_level.into())
            .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e)),
        None => {
            logging::init_console_logger(config.log_level.into());
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // Parse command line arguments
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            verbose,
            config,
        } => {
            let mut config = load_config(config, verbose)?;
            if let Some(listen) = listen {
                config.listen_addr = listen;
            }
            init_logging(&config)?;

            let addr = config.listen_addr.clone();
            let deduper = Arc::new(ImageDeduper::from_config(config)?);
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("Failed to bind {}", addr))?;

            info!("Listening on {}", addr);
            axum::serve(listener, server::router(deduper)).await?;
            Ok(())
        }

        Commands::Scan {
            folder,
            remove,
            dry_run,
            no_keep_blog,
            by_name,
            verbose,
            config,
        } => {
            let mut config = load_config(config, verbose)?;
            // Override config with command line arguments
            config.dry_run |= dry_run;
            if no_keep_blog {
                config.keep_blog_connected = false;
            }
            if by_name {
                config.grouping = GroupingKey::FileName;
            }
            init_logging(&config)?;

            let options = RemovalOptions {
                keep_blog_connected: config.keep_blog_connected,
                dry_run: config.dry_run,
            };
            let action = if remove {
                ScanAction::Remove
            } else {
                ScanAction::Check
            };

            let deduper = ImageDeduper::from_config(config)?;

            let progress_bar = ProgressBar::new_spinner();
            progress_bar.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.cyan} [{elapsed}] {pos} images hashed {msg}")?,
            );
            progress_bar.enable_steady_tick(Duration::from_millis(120));

            info!("Scanning '{}' for duplicate images...", folder);
            let bar = progress_bar.clone();
            let report = deduper
                .scan_folder(&folder, action, options, move |asset| {
                    bar.inc(1);
                    bar.set_message(asset.display_name().to_string());
                })
                .await;
            progress_bar.finish_and_clear();
            let report = report?;

            info!(
                "{} duplicate groups among {} images",
                report.duplicate_groups.len(),
                report.total_files
            );
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(())
        }

        Commands::GenerateConfig { path } => {
            let config = Config::default();
            config.save_to_file(&path)?;
            println!("Configuration file generated at: {}", path.display());
            Ok(())
        }
    }
}
