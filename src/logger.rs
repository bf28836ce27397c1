// A minimal logger for the `log` crate. It only needs levels and stderr, so
// there is no reason to pull in a logging framework for it.

use std::{
    path::{Path, PathBuf},
    sync::{LazyLock, Mutex},
};

use {jiff::tz::TimeZone, log::Log};

use crate::style::Theme;

/// A logger that writes every record it's given to stderr.
///
/// Filtering is left to the global max level set via `log::set_max_level`.
#[derive(Debug)]
pub struct Logger {
    tz: Mutex<Option<TimeZone>>,
}

impl Logger {
    /// Create a new logger and install it as the global logger.
    pub fn init() -> Result<&'static Logger, log::SetLoggerError> {
        let logger = Box::leak(Box::new(Logger { tz: Mutex::new(None) }));
        log::set_logger(logger)?;
        Ok(logger)
    }

    /// Sets the time zone used for the timestamp on each message.
    ///
    /// Until this is called, timestamps are printed in UTC.
    pub fn set_time_zone(&self, tz: TimeZone) {
        let mut logger_tz =
            self.tz.lock().unwrap_or_else(|err| err.into_inner());
        *logger_tz = Some(tz);
    }

    fn now(&self) -> String {
        // `Zoned::now()` may read the system time zone, which logs. Using a
        // timestamp and a time zone we already have avoids recursing into
        // ourselves.
        let ts = jiff::Timestamp::now();
        let tz = self.tz.lock().ok().and_then(|tz| tz.clone());
        match tz {
            Some(tz) => ts.to_zoned(tz).to_string(),
            None => ts.to_string(),
        }
    }
}

impl Log for Logger {
    fn enabled(&self, _: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let theme = Theme::stderr();
        let now = theme.timestamp(self.now());
        let level = theme.level(record.level());
        match (record.file(), record.line()) {
            (Some(file), Some(line)) => {
                eprintln!(
                    "{now}|{level}|{}:{line}: {}",
                    relative(file),
                    record.args(),
                );
            }
            (Some(file), None) => {
                let file = relative(file);
                eprintln!("{now}|{level}|{file}: {}", record.args());
            }
            _ => {
                eprintln!("{now}|{level}: {}", record.args());
            }
        }
    }

    fn flush(&self) {}
}

/// Strips the current working directory from the start of a source path.
fn relative<'p>(path: &'p str) -> &'p str {
    let Some(cwd) = cwd() else { return path };
    let Ok(relative) = Path::new(path).strip_prefix(cwd) else { return path };
    relative.to_str().unwrap_or(path)
}

fn cwd() -> Option<&'static Path> {
    static CWD: LazyLock<Option<PathBuf>> =
        LazyLock::new(|| std::env::current_dir().ok());
    CWD.as_deref()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_paths() {
        assert_eq!(relative("src/schedule.rs"), "src/schedule.rs");
        let Some(cwd) = cwd() else { return };
        let path = cwd.join("src").join("point.rs");
        let Some(path) = path.to_str() else { return };
        let want = Path::new("src").join("point.rs");
        assert_eq!(relative(path), want.to_str().unwrap());
    }
}
