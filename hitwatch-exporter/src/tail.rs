// Hitwatch Exporter - Log file tailer
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Line source for the monitor.
//!
//! Reads a log file (or stdin) line by line and forwards complete lines over a
//! channel. In follow mode the reader keeps polling at end of file like
//! `tail -f`, restarting from the top when the file is truncated. A partial
//! line at end of file is held back until its newline arrives.
//!
//! With [`TailConfig::start_at_end`] set, existing content is skipped and only
//! lines appended afterwards are read.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncSeekExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, info};

/// Where lines come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
    Stdin,
    File(PathBuf),
}

impl InputSource {
    /// `-` means stdin.
    pub fn from_arg(arg: &str) -> Self {
        if arg == "-" {
            InputSource::Stdin
        } else {
            InputSource::File(PathBuf::from(arg))
        }
    }
}

/// Configuration for the tailer.
#[derive(Debug, Clone)]
pub struct TailConfig {
    pub source: InputSource,
    /// Keep reading after end of file. Ignored for stdin.
    pub follow: bool,
    /// Skip what the file already holds. Ignored for stdin.
    pub start_at_end: bool,
    /// Delay between polls at end of file.
    pub poll_interval: Duration,
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            source: InputSource::Stdin,
            follow: true,
            start_at_end: false,
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Result of draining a reader up to its current end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Drained {
    /// Reached end of input; holds the bytes consumed.
    Eof(u64),
    /// The receiver went away.
    Closed,
}

/// Read lines from the configured source into `tx` until end of input or
/// until the receiver is dropped.
pub async fn run(config: TailConfig, tx: mpsc::Sender<String>) -> Result<(), TailError> {
    match &config.source {
        InputSource::Stdin => {
            info!("Reading from stdin");
            let mut reader = BufReader::new(tokio::io::stdin());
            let mut line = String::new();
            if drain(&mut reader, &mut line, &tx).await? == Drained::Closed {
                return Ok(());
            }
            flush_partial(&mut line, &tx).await;
            info!("End of stdin");
            Ok(())
        }
        InputSource::File(path) => follow_file(path, &config, &tx).await,
    }
}

async fn follow_file(
    path: &Path,
    config: &TailConfig,
    tx: &mpsc::Sender<String>,
) -> Result<(), TailError> {
    let file = File::open(path)
        .await
        .map_err(|e| TailError::Open(path.to_path_buf(), e))?;
    info!("Reading {} (follow={})", path.display(), config.follow);

    let mut reader = BufReader::new(file);
    let mut line = String::new();
    let mut position: u64 = 0;
    if config.start_at_end {
        position = reader.seek(SeekFrom::End(0)).await?;
        info!("Skipped {} existing bytes of {}", position, path.display());
    }

    loop {
        match drain(&mut reader, &mut line, tx).await? {
            Drained::Closed => return Ok(()),
            Drained::Eof(bytes) => position += bytes,
        }

        if !config.follow {
            flush_partial(&mut line, tx).await;
            info!("End of {} after {} bytes", path.display(), position);
            return Ok(());
        }

        let len = tokio::fs::metadata(path).await?.len();
        if len < position {
            info!("{} was truncated, reading from the start", path.display());
            reader.seek(SeekFrom::Start(0)).await?;
            position = 0;
            line.clear();
        }
        sleep(config.poll_interval).await;
    }
}

/// Forward every complete line until the reader reports end of input.
///
/// An incomplete trailing line stays in `line` so a later call can finish it.
async fn drain<R: AsyncRead + Unpin>(
    reader: &mut BufReader<R>,
    line: &mut String,
    tx: &mpsc::Sender<String>,
) -> Result<Drained, TailError> {
    let mut consumed = 0u64;
    loop {
        let n = reader.read_line(line).await?;
        if n == 0 {
            return Ok(Drained::Eof(consumed));
        }
        consumed += n as u64;

        if line.ends_with('\n') {
            let complete = std::mem::take(line);
            if tx.send(complete).await.is_err() {
                debug!("Line receiver dropped, stopping reader");
                return Ok(Drained::Closed);
            }
        }
    }
}

async fn flush_partial(line: &mut String, tx: &mpsc::Sender<String>) {
    if !line.is_empty() {
        // Receiver may already be gone at shutdown.
        let _ = tx.send(std::mem::take(line)).await;
    }
}

/// Tailer errors.
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    #[error("Cannot open {}: {}", .0.display(), .1)]
    Open(PathBuf, #[source] std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
