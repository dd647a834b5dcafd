//! Tracing setup for the CLI.
//!
//! Events are appended to `docqa.log` in the XDG state directory. If that file
//! cannot be opened, the subscriber writes to stderr instead and says why.

use anyhow::{anyhow, Result};
use std::fmt;
use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info,docqa_core=debug,docqa=debug";

const LOG_FILE: &str = "docqa.log";

/// Where the installed subscriber writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogSink {
    File(PathBuf),
    Stderr,
}

impl fmt::Display for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogSink::File(path) => write!(f, "{}", path.display()),
            LogSink::Stderr => f.write_str("stderr"),
        }
    }
}

/// `$XDG_STATE_HOME/docqa/docqa.log`, creating the directory if needed.
pub fn log_file_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("docqa")?;
    Ok(xdg_dirs.place_state_file(LOG_FILE)?)
}

/// Install the global subscriber. Fails only if one is already installed.
pub fn init() -> Result<LogSink> {
    let opened = log_file_path().and_then(|path| {
        let file = open_append(&path)?;
        Ok((path, file))
    });

    match opened {
        Ok((path, file)) => {
            install(BoxMakeWriter::new(Mutex::new(file)), false)?;
            tracing::info!(log = %path.display(), "docqa logging initialized");
            Ok(LogSink::File(path))
        }
        Err(err) => {
            install(BoxMakeWriter::new(io::stderr), io::stderr().is_terminal())?;
            tracing::warn!("file logging unavailable, using stderr: {:#}", err);
            Ok(LogSink::Stderr)
        }
    }
}

fn open_append(path: &Path) -> io::Result<File> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    fs::OpenOptions::new().create(true).append(true).open(path)
}

fn install(writer: BoxMakeWriter, ansi: bool) -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_writer(writer)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| anyhow!("cannot install log subscriber: {e}"))
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
