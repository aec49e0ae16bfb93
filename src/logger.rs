//! `log` backend for TextFE.
//!
//! Every record goes to one per-session file that is truncated on start-up,
//! so the file only ever holds the latest run:
//!
//!   Linux:    `$XDG_DATA_HOME/TextFE/textfe.log` (`~/.local/share` fallback)
//!   Windows:  `%APPDATA%\TextFE\textfe.log`
//!   macOS:    `~/Library/Application Support/TextFE/textfe.log`
//!
//! Warnings and errors are echoed to stderr. In verbose mode every record
//! that reaches the file is echoed as well.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use log::{LevelFilter, Log, Metadata, Record};

struct SessionLogger {
    file: Option<Mutex<File>>,
    path: PathBuf,
    level: LevelFilter,
    echo: LevelFilter,
}

static SESSION: OnceLock<SessionLogger> = OnceLock::new();

impl SessionLogger {
    fn append(&self, line: &str) {
        // A broken log file must never take the engine down with it.
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
        {
            let _ = writeln!(f, "{}", line);
        }
    }
}

impl Log for SessionLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!("{} {:<5} {}: {}", clock(), record.level(), record.target(), record.args());
        self.append(&line);
        if record.level() <= self.echo {
            eprintln!("{}", line);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
        {
            let _ = f.flush();
        }
    }
}

/// Path of the active session log, once [`init_with`] has opened it.
pub fn log_path() -> Option<&'static PathBuf> {
    SESSION.get().filter(|s| s.file.is_some()).map(|s| &s.path)
}

/// Install the logger at `info` without verbose echo.
pub fn init() {
    init_with(LevelFilter::Info, false);
}

/// Install the logger. Later calls are ignored.
///
/// Opens (truncating) the session file, registers the backend with the `log`
/// facade and chains a panic hook that records the panic before the previous
/// hook runs.
pub fn init_with(level: LevelFilter, verbose: bool) {
    if SESSION.get().is_some() {
        return;
    }
    let path = session_log_path();
    let file = open_truncated(&path);
    let session = SESSION.get_or_init(|| SessionLogger {
        file: file.map(Mutex::new),
        path,
        level,
        echo: if verbose { level } else { LevelFilter::Warn },
    });
    if log::set_logger(session).is_err() {
        return;
    }
    log::set_max_level(level);

    session.append(&format!("TextFE session log, started at unix time {}", unix_seconds()));

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        if let Some(s) = SESSION.get() {
            s.append(&format!("{} PANIC {}", clock(), info));
        }
        previous(info);
    }));
}

fn open_truncated(path: &Path) -> Option<File> {
    if let Some(dir) = path.parent() {
        let _ = std::fs::create_dir_all(dir);
    }
    match OpenOptions::new().create(true).write(true).truncate(true).open(path) {
        Ok(f) => Some(f),
        Err(e) => {
            eprintln!("logger: cannot open {}: {} (stderr only)", path.display(), e);
            None
        }
    }
}

fn session_log_path() -> PathBuf {
    platform_data_dir().join("TextFE").join("textfe.log")
}

fn platform_data_dir() -> PathBuf {
    let var = |k: &str| std::env::var_os(k).map(PathBuf::from);
    if cfg!(target_os = "windows") {
        if let Some(appdata) = var("APPDATA") {
            return appdata;
        }
    } else if cfg!(target_os = "macos") {
        if let Some(home) = var("HOME") {
            return home.join("Library/Application Support");
        }
    } else if let Some(xdg) = var("XDG_DATA_HOME") {
        return xdg;
    }
    var("HOME").map(|h| h.join(".local/share")).unwrap_or_else(|| PathBuf::from("."))
}

fn unix_seconds() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0)
}

/// UTC wall clock, `HH:MM:SS`.
fn clock() -> String {
    let t = unix_seconds() % 86_400;
    format!("{:02}:{:02}:{:02}", t / 3600, t % 3600 / 60, t % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_is_hh_mm_ss() {
        let c = clock();
        assert_eq!(c.len(), 8);
        assert_eq!(c.matches(':').count(), 2);
    }

    #[test]
    fn log_file_sits_in_app_folder() {
        let p = session_log_path();
        assert_eq!(p.file_name().and_then(|n| n.to_str()), Some("textfe.log"));
        assert_eq!(p.parent().and_then(|d| d.file_name()).and_then(|n| n.to_str()), Some("TextFE"));
    }
}
