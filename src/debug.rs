//! File-based debug logging for gvrender.
//!
//! Controlled by the `DEBUG_LEVEL` environment variable:
//! - 0 or unset: No debugging
//! - 1: Errors only
//! - 2: Info level (engine selection, dispatch)
//! - 3: Debug level (post-processing, rasterization)
//! - 4: Trace level (every operation)
//!
//! Output goes to `gvrender_debug.log` in the system temp directory, so
//! rendered output written to stdout is never interleaved with diagnostics.
//! [`init_log_bridge`] routes the `log` facade into the same file.

use parking_lot::Mutex;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Debug level configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum DebugLevel {
    Off = 0,
    Error = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl DebugLevel {
    fn from_env() -> Self {
        match std::env::var("DEBUG_LEVEL") {
            Ok(val) => Self::from_number(val.trim()),
            Err(_) => DebugLevel::Off,
        }
    }

    fn from_number(val: &str) -> Self {
        match val.parse::<u8>() {
            Ok(1) => DebugLevel::Error,
            Ok(2) => DebugLevel::Info,
            Ok(3) => DebugLevel::Debug,
            Ok(4) => DebugLevel::Trace,
            _ => DebugLevel::Off,
        }
    }

    fn from_log_level(level: log::Level) -> Self {
        match level {
            log::Level::Error | log::Level::Warn => DebugLevel::Error,
            log::Level::Info => DebugLevel::Info,
            log::Level::Debug => DebugLevel::Debug,
            log::Level::Trace => DebugLevel::Trace,
        }
    }
}

/// Path of the debug log file.
pub fn log_path() -> std::path::PathBuf {
    std::env::temp_dir().join("gvrender_debug.log")
}

/// Global debug logger
struct DebugLogger {
    level: DebugLevel,
    file: Option<std::fs::File>,
}

impl DebugLogger {
    fn new() -> Self {
        Self::with_level(DebugLevel::from_env())
    }

    fn with_level(level: DebugLevel) -> Self {
        let mut logger = DebugLogger { level, file: None };
        if level != DebugLevel::Off {
            logger.open_file();
        }
        logger
    }

    fn open_file(&mut self) {
        // Diagnostics are optional; an unwritable temp dir must not fail a render
        if let Ok(f) = OpenOptions::new()
            .write(true)
            .truncate(true)
            .create(true)
            .open(log_path())
        {
            self.file = Some(f);
            self.write_raw(&format!(
                "\n{}\ngvrender debug session started at {} (level={:?})\n{}\n",
                "=".repeat(80),
                get_timestamp(),
                self.level,
                "=".repeat(80)
            ));
        }
    }

    fn write_raw(&mut self, msg: &str) {
        if let Some(ref mut file) = self.file {
            let _ = file.write_all(msg.as_bytes());
            let _ = file.flush();
        }
    }

    fn log(&mut self, level: DebugLevel, category: &str, msg: &str) {
        if level <= self.level {
            self.write_entry(level, category, msg);
        }
    }

    fn write_entry(&mut self, level: DebugLevel, category: &str, msg: &str) {
        let level_str = match level {
            DebugLevel::Error => "ERROR",
            DebugLevel::Info => "INFO ",
            DebugLevel::Debug => "DEBUG",
            DebugLevel::Trace => "TRACE",
            DebugLevel::Off => return,
        };
        self.write_raw(&format!(
            "[{}] [{}] [{}] {}\n",
            get_timestamp(),
            level_str,
            category,
            msg
        ));
    }
}

static LOGGER: OnceLock<Mutex<DebugLogger>> = OnceLock::new();

fn get_logger() -> &'static Mutex<DebugLogger> {
    LOGGER.get_or_init(|| Mutex::new(DebugLogger::new()))
}

fn get_timestamp() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}.{:06}", now.as_secs(), now.subsec_micros())
}

/// Check if debugging is enabled at given level
pub fn is_enabled(level: DebugLevel) -> bool {
    let logger = get_logger().lock();
    level <= logger.level
}

/// Log a message at specified level
pub fn log(level: DebugLevel, category: &str, msg: &str) {
    let mut logger = get_logger().lock();
    logger.log(level, category, msg);
}

/// Log formatted message
pub fn logf(level: DebugLevel, category: &str, args: fmt::Arguments) {
    if is_enabled(level) {
        log(level, category, &format!("{}", args));
    }
}

/// Bridges the `log` facade into the debug log file.
///
/// Records are written under their module target as the category. When
/// `RUST_LOG` is set they are mirrored to stderr as well.
struct LogBridge;

static BRIDGE: LogBridge = LogBridge;

static MIRROR_STDERR: AtomicBool = AtomicBool::new(false);

/// Set when the CLI flag or `RUST_LOG` chose the level; config must not override it.
static LEVEL_PINNED: OnceLock<bool> = OnceLock::new();

impl log::Log for LogBridge {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let msg = record.args().to_string();
        {
            // The bridge filter already decided; DEBUG_LEVEL only gates the macros
            let mut logger = get_logger().lock();
            if logger.file.is_none() {
                logger.open_file();
            }
            logger.write_entry(DebugLevel::from_log_level(record.level()), record.target(), &msg);
        }
        if MIRROR_STDERR.load(Ordering::Relaxed) {
            eprintln!("[{}] {}: {}", record.level(), record.target(), msg);
        }
    }

    fn flush(&self) {}
}

fn filter_from_env() -> Option<log::LevelFilter> {
    let value = std::env::var("RUST_LOG").ok()?;
    // Only a bare level is understood; per-module directives fall back to info
    Some(
        value
            .trim()
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info),
    )
}

/// Install the `log` bridge.
///
/// Precedence: explicit `level` (CLI flag), then `RUST_LOG`, then `Warn`
/// until [`apply_config_log_level`] runs. Only the first call installs.
pub fn init_log_bridge(level: Option<log::LevelFilter>) {
    let env_filter = filter_from_env();
    MIRROR_STDERR.store(env_filter.is_some(), Ordering::Relaxed);
    let pinned = level.or(env_filter);
    let filter = pinned.unwrap_or(log::LevelFilter::Warn);

    if log::set_logger(&BRIDGE).is_ok() {
        let _ = LEVEL_PINNED.set(pinned.is_some());
        log::set_max_level(filter);
    }
}

/// Apply the level from the config file unless the CLI or `RUST_LOG` chose one.
pub fn apply_config_log_level(level: log::LevelFilter) {
    if !LEVEL_PINNED.get().copied().unwrap_or(true) {
        log::set_max_level(level);
    }
}

// Convenience macros for logging
#[macro_export]
macro_rules! debug_error {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Error, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_info {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Info, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_log {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Debug, $category, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! debug_trace {
    ($category:expr, $($arg:tt)*) => {
        $crate::debug::logf($crate::debug::DebugLevel::Trace, $category, format_args!($($arg)*))
    };
}
