use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Local};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use utils::{looks_like_directory, normalized_path_from_user_string};

utils::configurable_constants! {

    /// Where logs go. Unset or empty logs to the console.
    ///
    /// If the path exists as a directory or ends with a /, a new log file named
    /// `<LOG_PREFIX>_<timestamp>_<pid>.log` is created in that directory. Otherwise the
    /// path names the log file itself.
    ref LOG_DEST : Option<String> = None;

    /// "json" for json lines; anything else is text. Defaults to json for files and
    /// text for the console.
    ref LOG_FORMAT : Option<String> = None;

    /// Base name of log files created in a log directory.
    ref LOG_PREFIX : String = "fs_bridge".to_owned();
}

/// Default log levels. Override using the `RUST_LOG` env variable.
const DEFAULT_LOG_LEVEL_FILE: &str = "info";
const DEFAULT_LOG_LEVEL_CONSOLE: &str = "warn";

const LOG_FILE_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f%z";

#[derive(Clone, Debug, PartialEq)]
pub enum LoggingMode {
    Directory(PathBuf),
    File(PathBuf),
    Console,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoggingConfig {
    pub logging_mode: LoggingMode,
    pub use_json: bool,
    pub version: String,
}

impl LoggingConfig {
    /// Reads `FS_BRIDGE_LOG_DEST` and `FS_BRIDGE_LOG_FORMAT`.
    pub fn new(version: String) -> LoggingConfig {
        Self::for_destination(LOG_DEST.as_deref(), LOG_FORMAT.as_deref(), version)
    }

    pub fn for_destination(log_dest: Option<&str>, log_format: Option<&str>, version: String) -> LoggingConfig {
        let logging_mode = match log_dest.map(str::trim) {
            None | Some("") => LoggingMode::Console,
            Some(log_dest) => {
                let path = normalized_path_from_user_string(log_dest);
                if looks_like_directory(log_dest, &path) {
                    LoggingMode::Directory(path)
                } else {
                    LoggingMode::File(path)
                }
            },
        };

        let use_json = match log_format {
            Some(format) => format.trim().eq_ignore_ascii_case("json"),
            None => logging_mode != LoggingMode::Console,
        };

        Self {
            logging_mode,
            use_json,
            version,
        }
    }
}

/// Sets up the global subscriber. Later calls, or calls after the host installed its
/// own subscriber, leave the existing one in place.
pub fn init_logging(cfg: LoggingConfig) {
    let maybe_log_file = match &cfg.logging_mode {
        LoggingMode::Directory(log_dir) => Some(log_file_in_dir(log_dir)),
        LoggingMode::File(path) => Some(path.clone()),
        LoggingMode::Console => None,
    };

    if let Some(log_file) = maybe_log_file {
        // Fall back to the console if the file cannot be written.
        if let Err(e) = init_logging_to_file(&log_file, cfg.use_json) {
            init_logging_to_console(&cfg);
            error!("Error logging to file {log_file:?} ({e}); falling back to console logging.");
        }
    } else {
        init_logging_to_console(&cfg);
    }

    info!("{}, fs_bridge {}", cfg.version, env!("CARGO_PKG_VERSION"));
}

fn init_logging_to_console(cfg: &LoggingConfig) {
    let fmt_layer_base = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false);
    let fmt_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL_CONSOLE))
        .unwrap_or_default();

    let registry = tracing_subscriber::registry();
    let result = if cfg.use_json {
        registry.with(fmt_layer_base.json().with_filter(fmt_filter)).try_init()
    } else {
        registry.with(fmt_layer_base.pretty().with_filter(fmt_filter)).try_init()
    };

    // A subscriber installed earlier, e.g. by the host, stays in place.
    let _ = result;
}

fn init_logging_to_file(path: &Path, use_json: bool) -> Result<(), std::io::Error> {
    use tracing_appender::{non_blocking, rolling};

    let Some(file_name) = path.file_name() else {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("log destination {path:?} does not name a file"),
        ));
    };

    let log_directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent)?;
            parent
        },
        _ => Path::new("."),
    };

    // Fail here, before installing anything, if the file is not writable.
    std::fs::OpenOptions::new().create(true).append(true).open(path)?;

    let (writer, guard) = non_blocking(rolling::never(log_directory, file_name));

    // The guard flushes the background writer when dropped, so it lives for the process.
    static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
    let _ = FILE_GUARD.set(guard);

    let fmt_layer_base = tracing_subscriber::fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false)
        .with_ansi(false)
        .with_writer(writer);
    let fmt_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_LOG_LEVEL_FILE))
        .unwrap_or_default();

    let registry = tracing_subscriber::registry();
    let result = if use_json {
        registry.with(fmt_layer_base.json().with_filter(fmt_filter)).try_init()
    } else {
        registry.with(fmt_layer_base.pretty().with_filter(fmt_filter)).try_init()
    };

    result.map_err(|e| std::io::Error::other(format!("cannot install file logger: {e}")))
}

/// Build `<prefix>_<YYYYMMDD>T<HHMMSS><mmm><+/-HHMM>_<pid>.log` in `dir`.
/// The timestamp is local time with a numeric offset, so the name is filename safe.
pub fn log_file_in_dir(dir: impl AsRef<Path>) -> PathBuf {
    let now_local: DateTime<Local> = Local::now();
    let now_fixed: DateTime<FixedOffset> = now_local.with_timezone(now_local.offset());

    let file_name = format!(
        "{}_{}_{}.log",
        LOG_PREFIX.as_str(),
        now_fixed.format(LOG_FILE_TIMESTAMP_FORMAT),
        std::process::id()
    );
    dir.as_ref().join(file_name)
}

/// Parse `<prefix>_<YYYYMMDD>T<HHMMSS><mmm><+/-HHMM>_<pid>.log`, from a full path or a
/// bare file name. Returns (prefix, timestamp, pid).
pub fn parse_log_file_name(path: impl AsRef<Path>) -> Option<(String, DateTime<FixedOffset>, u32)> {
    let file_name = path.as_ref().file_name()?.to_str()?;
    let file_name = file_name.strip_suffix(".log")?;

    // Split from the right so the prefix may contain underscores.
    let mut parts = file_name.rsplitn(3, '_');
    let pid: u32 = parts.next()?.parse().ok()?;
    let ts = DateTime::parse_from_str(parts.next()?, LOG_FILE_TIMESTAMP_FORMAT).ok()?;
    let prefix = parts.next()?;

    Some((prefix.to_owned(), ts, pid))
}
