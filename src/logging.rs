//! Log sinks
//!
//! Console output is JSON on stderr in every transport, since stdout carries
//! stdio protocol frames. `--log-file` adds a second JSON sink that rolls
//! over by size: `gateway.log` is live, `gateway.log.1` is the newest
//! rolled generation.

use anyhow::Context;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Size at which the live log file is rolled
pub const ROLL_AT_BYTES: u64 = 10 * 1024 * 1024;

/// Rolled generations kept next to the live file
pub const KEEP_ROLLED: usize = 5;

/// Install the global subscriber
///
/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console = fmt::layer()
        .json()
        .with_writer(io::stderr)
        .with_filter(filter());
    let registry = tracing_subscriber::registry().with(console);

    match log_file {
        Some(path) => {
            let sink = RollingLogFile::open(path, ROLL_AT_BYTES, KEEP_ROLLED)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            let file = fmt::layer()
                .json()
                .with_ansi(false)
                .with_writer(sink)
                .with_filter(filter());
            registry.with(file).try_init()?;
            eprintln!(
                "Logging to file: {} ({} MB rotation, {} rolled files kept)",
                path.display(),
                ROLL_AT_BYTES / (1024 * 1024),
                KEEP_ROLLED
            );
        }
        None => registry.try_init()?,
    }

    Ok(())
}

// ============================================================================
// Rolling file sink
// ============================================================================

/// Size-rolled JSON log file shared by every tracing event
///
/// Each `write` holds one formatted event and lands whole in one file, so a
/// JSON record is never split across generations.
#[derive(Debug, Clone)]
pub struct RollingLogFile {
    sink: Arc<Mutex<Sink>>,
}

#[derive(Debug)]
struct Sink {
    path: PathBuf,
    file: File,
    written: u64,
    roll_at: u64,
    keep: usize,
}

impl RollingLogFile {
    pub fn open(path: impl AsRef<Path>, roll_at: u64, keep: usize) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let (file, written) = open_append(&path)?;

        Ok(Self {
            sink: Arc::new(Mutex::new(Sink {
                path,
                file,
                written,
                roll_at,
                keep,
            })),
        })
    }

    fn sink(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Sink {
    fn generation(&self, n: usize) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}", n));
        PathBuf::from(name)
    }

    /// Shift every generation up by one; the oldest is overwritten
    fn roll(&mut self) -> io::Result<()> {
        for n in (1..self.keep).rev() {
            let older = self.generation(n);
            if older.exists() {
                fs::rename(&older, self.generation(n + 1))?;
            }
        }
        if self.keep == 0 {
            fs::remove_file(&self.path)?;
        } else {
            fs::rename(&self.path, self.generation(1))?;
        }

        let (file, written) = open_append(&self.path)?;
        self.file = file;
        self.written = written;
        Ok(())
    }

    fn append(&mut self, record: &[u8]) -> io::Result<()> {
        let len = record.len() as u64;
        // An oversized record still goes into a fresh file rather than looping
        if self.written > 0 && self.written + len > self.roll_at {
            self.roll()?;
        }
        self.file.write_all(record)?;
        self.written += len;
        Ok(())
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let written = file.metadata()?.len();
    Ok((file, written))
}

impl Write for RollingLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink().append(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink().file.flush()
    }
}

impl<'a> fmt::MakeWriter<'a> for RollingLogFile {
    type Writer = RollingLogFile;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
