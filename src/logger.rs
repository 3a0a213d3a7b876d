//! Timestamped file logger. The terminal belongs to the UI, so lines only go to
//! the `--log-file` sink; without one, `log!` is a no-op.

use chrono::Local;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

static LOGGER: OnceLock<Logger> = OnceLock::new();

pub struct Logger {
    prefix: Option<String>,
    sink: Mutex<File>,
}

impl Logger {
    fn new(prefix: Option<String>, sink: File) -> Self {
        Self {
            prefix,
            sink: Mutex::new(sink),
        }
    }

    pub fn log(&self, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let line = format_line(&timestamp, self.prefix.as_deref(), message);
        if let Ok(mut sink) = self.sink.lock() {
            let _ = writeln!(sink, "{}", line);
        }
    }
}

fn format_line(timestamp: &str, prefix: Option<&str>, message: &str) -> String {
    match prefix {
        Some(prefix) => format!("[{}][{}] {}", timestamp, prefix, message),
        None => format!("[{}] {}", timestamp, message),
    }
}

/// Open (append) the log file and install the process logger. Later calls keep the first sink.
pub fn init_logger(path: &Path, prefix: Option<String>) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = LOGGER.set(Logger::new(prefix, file));
    Ok(())
}

pub fn log(message: &str) {
    if let Some(logger) = LOGGER.get() {
        logger.log(message);
    }
}

#[macro_export]
macro_rules! log {
    ($($arg:tt)*) => {
        $crate::logger::log(&format!($($arg)*))
    };
}
