use std::{
    fs::File,
    io::{self, Write},
    sync::Mutex,
    time::Instant,
};

use chrono::Utc;
use once_cell::sync::OnceCell;

static LOGGER: OnceCell<Logger> = OnceCell::new();

/// Severity of a log line. Lines below the configured minimum are dropped.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => f.write_str("DEBUG"),
            Self::Info => f.write_str("INFO"),
            Self::Warn => f.write_str("WARN"),
            Self::Error => f.write_str("ERROR"),
        }
    }
}

struct LoggerImpl {
    pub sink: Box<dyn Write + Send>,
    pub start_instant: Instant,
}

impl LoggerImpl {
    fn new(kind: LogKind) -> Self {
        let start_instant = Instant::now();
        match kind {
            LogKind::STDOUT => Self {
                sink: Box::new(io::stdout()),
                start_instant,
            },
            LogKind::FILE => {
                let now = Utc::now();
                let filename = format!("archimedes-{}.log", now.timestamp());
                let path = std::env::temp_dir().join(filename);
                Self {
                    sink: Box::new(File::create(path).unwrap()),
                    start_instant,
                }
            }
        }
    }

    fn log<T>(&mut self, level: LogLevel, data: T)
    where
        T: std::fmt::Display,
    {
        let now = self.start_instant.elapsed();
        let seconds = now.as_secs();
        let hours = seconds / 3600;
        let minutes = (seconds / 60) % 60;
        let seconds = seconds % 60;
        let milliseconds = now.subsec_millis();

        writeln!(
            self.sink,
            "[{hours:02}:{minutes:02}:{seconds:02}.{milliseconds:03}] [{level}] {data}"
        )
        .unwrap();
    }
}

/// `LogKind` represents the kind of logging: `stdout` or `logfile`.
#[derive(Copy, Clone, PartialEq, Eq)]
pub enum LogKind {
    /// It logs to console, the default choice.
    STDOUT,

    /// It logs on a file in /tmp/archimedes-<timestamp>.log
    FILE,
}

struct Logger {
    pub inner_impl: Mutex<LoggerImpl>,
    pub min_level: LogLevel,
}

impl Default for Logger {
    fn default() -> Self {
        Self {
            inner_impl: Mutex::new(LoggerImpl::new(LogKind::STDOUT)),
            min_level: LogLevel::Info,
        }
    }
}

impl Logger {
    fn new(kind: LogKind, min_level: LogLevel) -> Self {
        Self {
            inner_impl: Mutex::new(LoggerImpl::new(kind)),
            min_level,
        }
    }

    fn log<T>(&self, level: LogLevel, data: T)
    where
        T: std::fmt::Display,
    {
        if level < self.min_level {
            return;
        }

        if let Ok(ref mut inner) = self.inner_impl.lock() {
            inner.log(level, data);
        }
    }
}

/// Installs the global logger. Lines below `min_level` are discarded.
/// A second call is a no-op: the first configuration wins.
pub fn init_logger(kind: LogKind, min_level: LogLevel) {
    LOGGER.set(Logger::new(kind, min_level)).ok();
}

pub fn log_at<T>(level: LogLevel, data: T)
where
    T: std::fmt::Display,
{
    LOGGER.get().map_or((), |logger| logger.log(level, data));
}

pub fn log<T>(data: T)
where
    T: std::fmt::Display,
{
    log_at(LogLevel::Info, data);
}

pub fn log_debug<T>(data: T)
where
    T: std::fmt::Display,
{
    log_at(LogLevel::Debug, data);
}

#[cfg(test)]
mod tests {
    use std::fs;

    use crate::{init_logger, log, log_debug, LogKind, LogLevel};

    #[test]
    fn logger_file() {
        init_logger(LogKind::FILE, LogLevel::Info);
        // Below the minimum level, must not reach the sink.
        log_debug("dropped".to_string());
        log("ok".to_string());
        let dir = std::env::temp_dir();
        let files = fs::read_dir(dir).unwrap();
        for f in files.flatten() {
            let p = f.path();
            if let Some(ext) = p.extension() {
                let s = p.to_str().unwrap();
                if ext == "log" && s.contains("archimedes") {
                    let s = fs::read_to_string(p.clone()).unwrap();
                    fs::remove_file(p).unwrap();
                    assert_eq!(s, "[00:00:00.000] [INFO] ok\n".to_string());
                }
            }
        }
    }
}
