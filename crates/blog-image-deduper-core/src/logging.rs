use log::{error, info, warn, LevelFilter};
use std::path::Path;

// For file-based logging with rotation
use log4rs::append::console::ConsoleAppender;
use log4rs::append::rolling_file::policy::compound::roll::fixed_window::FixedWindowRoller;
use log4rs::append::rolling_file::policy::compound::trigger::size::SizeTrigger;
use log4rs::append::rolling_file::policy::compound::CompoundPolicy;
use log4rs::append::rolling_file::RollingFileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;

const LOG_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S)} [{l}] [{M}:{L}] - {m}{n}";

/// Initialize the logger with timestamp, log level, and module path.
/// Records go to the console and to a size-rotated file in `log_dir`.
pub fn init_logger(log_dir: &Path, level: LevelFilter) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let log_file_path = log_dir.join("dedup.log");
    let archived_logs_pattern = format!("{}/dedup.{{}}.log", log_dir.display());

    // Rotate at 10MB, keep 5 archives
    let file_trigger = SizeTrigger::new(10 * 1024 * 1024);
    let file_roller = FixedWindowRoller::builder()
        .build(&archived_logs_pattern, 5)
        .map_err(|e| format!("Failed to create log roller: {}", e))?;
    let compound_policy = CompoundPolicy::new(Box::new(file_trigger), Box::new(file_roller));

    let rolling_file = RollingFileAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build(&log_file_path, Box::new(compound_policy))
        .map_err(|e| format!("Failed to create log appender: {}", e))?;

    let console = ConsoleAppender::builder()
        .encoder(Box::new(PatternEncoder::new(LOG_PATTERN)))
        .build();

    let config = Config::builder()
        .appender(Appender::builder().build("file", Box::new(rolling_file)))
        .appender(Appender::builder().build("console", Box::new(console)))
        .build(
            Root::builder()
                .appender("file")
                .appender("console")
                .build(LevelFilter::Trace),
        )
        .map_err(|e| format!("Failed to build log config: {}", e))?;

    log4rs::init_config(config).map_err(|e| format!("Failed to initialize log4rs: {}", e))?;

    log::set_max_level(env_level().unwrap_or(level));

    info!("Blog image deduplication started");
    info!("Logging to file: {}", log_file_path.display());
    Ok(())
}

/// Console-only logging through env_logger, honouring `DEDUP_LOG`
pub fn init_console_logger(level: LevelFilter) {
    let _ = env_logger::Builder::new()
        .filter_level(env_level().unwrap_or(level))
        .format_timestamp_secs()
        .try_init();
}

fn env_level() -> Option<LevelFilter> {
    std::env::var("DEDUP_LOG").ok()?.parse::<LevelFilter>().ok()
}

/// Log a blog usage lookup that failed
pub fn log_lookup_error(url: &str, error: &dyn std::error::Error) {
    warn!("Blog usage lookup failed - Url: {}, Error: {}", url, error);
}

/// Log a storage operation that failed
pub fn log_storage_error(operation: &str, paths: &[String], error: &dyn std::error::Error) {
    error!(
        "Storage operation failed - Operation: {}, Paths: {}, Error: {}",
        operation,
        paths.join(", "),
        error
    );
}

/// Log a storage modification
pub fn log_storage_removal(bucket: &str, path: &str, details: Option<&str>) {
    let details_str = details.unwrap_or("");
    info!(
        "STORAGE CHANGE - Operation: remove, Bucket: {}, Path: {}{}",
        bucket,
        path,
        if details_str.is_empty() {
            "".to_string()
        } else {
            format!(", Details: {}", details_str)
        }
    );
}
