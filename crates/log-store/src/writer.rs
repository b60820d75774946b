use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::{Duration, Instant};

use gasoline_core_types::{LogEntry, Warnings};
use parking_lot::Mutex;

use crate::config::LogStoreCfg;
use crate::errors::{LogStoreError, LogStoreResult};
use crate::metrics::LogStoreMetrics;

enum Command {
    Append(Vec<LogEntry>),
    Rewrite(Vec<LogEntry>),
    Flush(mpsc::Sender<io::Result<()>>),
    Shutdown,
}

/// Owner side of the mirror writer thread.
pub struct WriterHandle {
    tx: SyncSender<Command>,
    done: Mutex<Option<Receiver<()>>>,
    metrics: LogStoreMetrics,
    shutdown_timeout: Duration,
}

impl WriterHandle {
    pub fn append(&self, entries: Vec<LogEntry>) -> LogStoreResult<()> {
        self.enqueue(Command::Append(entries))
    }

    pub fn rewrite(&self, entries: Vec<LogEntry>) -> LogStoreResult<()> {
        self.enqueue(Command::Rewrite(entries))
    }

    fn enqueue(&self, cmd: Command) -> LogStoreResult<()> {
        match self.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                let lost = match &cmd {
                    Command::Append(entries) | Command::Rewrite(entries) => entries.len().max(1),
                    Command::Flush(_) | Command::Shutdown => 1,
                };
                self.metrics.record_drop(lost as u64);
                Err(LogStoreError::Dropped)
            }
            Err(TrySendError::Disconnected(_)) => Err(LogStoreError::Closed),
        }
    }

    /// Blocks until everything queued before this call is on disk.
    pub fn flush(&self) -> LogStoreResult<()> {
        let (tx, rx) = mpsc::channel();
        self.tx
            .send(Command::Flush(tx))
            .map_err(|_| LogStoreError::Closed)?;
        match rx.recv_timeout(self.shutdown_timeout) {
            Ok(res) => res.map_err(LogStoreError::from),
            Err(RecvTimeoutError::Timeout) => Err(LogStoreError::Io("flush timed out".into())),
            Err(RecvTimeoutError::Disconnected) => Err(LogStoreError::Closed),
        }
    }

    /// Asks the worker to drain and exit, waiting at most the configured timeout.
    /// Returns `false` when the worker did not finish in time.
    pub fn shutdown(&self) -> bool {
        let Some(done) = self.done.lock().take() else {
            return true;
        };
        let deadline = Instant::now() + self.shutdown_timeout;
        loop {
            match self.tx.try_send(Command::Shutdown) {
                Ok(()) => break,
                Err(TrySendError::Disconnected(_)) => return true,
                Err(TrySendError::Full(_)) => {
                    if Instant::now() >= deadline {
                        eprintln!("[log-store][writer] shutdown timed out with a full queue");
                        return false;
                    }
                    thread::sleep(Duration::from_millis(5));
                }
            }
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        match done.recv_timeout(remaining) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => true,
            Err(RecvTimeoutError::Timeout) => {
                eprintln!("[log-store][writer] shutdown timed out before the queue drained");
                false
            }
        }
    }
}

impl Drop for WriterHandle {
    fn drop(&mut self) {
        let _ = self.tx.try_send(Command::Shutdown);
    }
}

pub fn spawn(
    cfg: &LogStoreCfg,
    path: PathBuf,
    metrics: LogStoreMetrics,
    warnings: Warnings,
) -> LogStoreResult<WriterHandle> {
    if let Some(parent) = path.parent() {
        create_private_dir(parent)?;
    }
    let (tx, rx) = mpsc::sync_channel(cfg.channel_capacity.max(1));
    let (done_tx, done_rx) = mpsc::channel();
    let mut state = WriterState::new(path, cfg.rotate_bytes, metrics.clone(), warnings);
    thread::Builder::new()
        .name("log-store-writer".into())
        .spawn(move || {
            while let Ok(cmd) = rx.recv() {
                match cmd {
                    Command::Append(entries) => {
                        let n = entries.len() as u64;
                        match state.append(&entries) {
                            Ok(()) => state.metrics.record_written(n),
                            Err(err) => {
                                eprintln!("[log-store][writer] append failed: {err}");
                                state.metrics.record_write_error();
                            }
                        }
                    }
                    Command::Rewrite(entries) => {
                        if let Err(err) = state.rewrite(&entries) {
                            eprintln!("[log-store][writer] rewrite failed: {err}");
                            state.metrics.record_write_error();
                        }
                    }
                    Command::Flush(reply) => {
                        let _ = reply.send(state.flush());
                    }
                    Command::Shutdown => break,
                }
            }
            let _ = state.flush();
            let _ = done_tx.send(());
        })?;
    Ok(WriterHandle {
        tx,
        done: Mutex::new(Some(done_rx)),
        metrics,
        shutdown_timeout: Duration::from_millis(cfg.shutdown_timeout_ms),
    })
}

struct WriterState {
    path: PathBuf,
    rotate_bytes: u64,
    sink: Option<BufWriter<File>>,
    bytes_written: u64,
    metrics: LogStoreMetrics,
    warnings: Warnings,
}

impl WriterState {
    fn new(path: PathBuf, rotate_bytes: u64, metrics: LogStoreMetrics, warnings: Warnings) -> Self {
        Self {
            path,
            rotate_bytes,
            sink: None,
            bytes_written: 0,
            metrics,
            warnings,
        }
    }

    fn append(&mut self, entries: &[LogEntry]) -> io::Result<()> {
        for entry in entries {
            let line = serde_json::to_vec(entry)
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
            self.maybe_rotate();
            let sink = self.open_sink()?;
            sink.write_all(&line)?;
            sink.write_all(b"\n")?;
            self.bytes_written += line.len() as u64 + 1;
        }
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        Ok(())
    }

    /// Replaces the mirror with exactly `entries` via temp file and rename.
    fn rewrite(&mut self, entries: &[LogEntry]) -> io::Result<()> {
        self.sink = None;
        let tmp = sibling(&self.path, "tmp");
        let mut bytes = 0u64;
        {
            let mut out = BufWriter::new(open_private(&tmp, true)?);
            for entry in entries {
                let line = serde_json::to_vec(entry)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err.to_string()))?;
                out.write_all(&line)?;
                out.write_all(b"\n")?;
                bytes += line.len() as u64 + 1;
            }
            out.flush()?;
            out.get_ref().sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        self.bytes_written = bytes;
        self.metrics.record_rewrite();
        Ok(())
    }

    fn open_sink(&mut self) -> io::Result<&mut BufWriter<File>> {
        if self.sink.is_none() {
            let file = open_private(&self.path, false)?;
            self.bytes_written = file.metadata().map(|m| m.len()).unwrap_or(0);
            self.sink = Some(BufWriter::new(file));
        }
        self.sink
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::Other, "log mirror not open"))
    }

    fn maybe_rotate(&mut self) {
        if self.rotate_bytes == 0 || self.bytes_written < self.rotate_bytes {
            return;
        }
        if let Some(mut sink) = self.sink.take() {
            let _ = sink.flush();
        }
        let old = sibling(&self.path, "old");
        match fs::rename(&self.path, &old) {
            Ok(()) => {
                self.bytes_written = 0;
                self.metrics.record_rotation();
            }
            Err(err) => {
                eprintln!("[log-store][writer] rotate failed: {err}");
                self.warnings
                    .push(format!("console log rotation failed for {}: {err}", self.path.display()));
                // Keep appending to the oversized file rather than retrying every line.
                self.bytes_written = 0;
            }
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
            sink.get_ref().sync_all()?;
        }
        Ok(())
    }
}

/// `<file>.<suffix>` next to `path`.
pub fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}

pub(crate) fn open_private(path: &Path, truncate: bool) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.create(true);
    if truncate {
        opts.write(true).truncate(true);
    } else {
        opts.append(true);
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(0o600);
    }
    opts.open(path)
}

pub(crate) fn create_private_dir(dir: &Path) -> io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(0o750);
    }
    builder.create(dir)
}
