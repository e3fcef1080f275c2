//! `LogSink` implementations for the pump's human-readable event log.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use pump_traits::LogSink;
use pump_traits::clock::{Clock, MonotonicClock};

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogSink;

impl LogSink for NullLogSink {
    fn append_text(&self, _message: &str) {}
}

/// Forwards each line to `tracing` at info level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn append_text(&self, message: &str) {
        tracing::info!(target: "pump_log", "{message}");
    }
}

/// Appends one line per message to a file, creating it on first use.
pub struct FileLogSink {
    path: String,
}

impl FileLogSink {
    pub fn new(path: String) -> Self {
        Self { path }
    }
}

impl LogSink for FileLogSink {
    fn append_text(&self, message: &str) {
        use std::fs::OpenOptions;
        use std::io::Write;
        if let Ok(mut file) = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
        {
            let _ = writeln!(file, "{}", message);
        }
    }
}

/// Write via a sibling temp file and rename, so readers never see a partial log.
fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp_name);
    {
        let mut f = std::fs::File::create(&tmp)?;
        f.write_all(bytes)?;
        f.sync_all()?;
    }
    std::fs::rename(tmp, path)
}

#[derive(Debug, Default)]
struct LogBuffer {
    output: String,
    entries: Vec<String>,
}

/// In-memory log with `[HH:MM:SS]` uptime stamps, as shown on the device's log screen.
pub struct MemoryLog {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
    buf: Mutex<LogBuffer>,
}

impl Default for MemoryLog {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(MonotonicClock::new()))
    }

    pub fn with_clock(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        let log = Self {
            clock,
            epoch,
            buf: Mutex::new(LogBuffer::default()),
        };
        log.push("Log initialized");
        log
    }

    /// Everything logged since the last clear, one stamped line per entry.
    pub fn full_log(&self) -> String {
        self.buf
            .lock()
            .map(|b| b.output.clone())
            .unwrap_or_default()
    }

    /// Messages without stamps, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.buf
            .lock()
            .map(|b| b.entries.clone())
            .unwrap_or_default()
    }

    pub fn clear(&self) {
        if let Ok(mut b) = self.buf.lock() {
            *b = LogBuffer::default();
        }
        self.push("Log cleared and reinitialized");
    }

    pub fn save_to_file(&self, path: &Path) -> std::io::Result<()> {
        write_atomic(path, self.full_log().as_bytes())
    }

    fn stamp(&self) -> String {
        let secs = self.clock.ms_since(self.epoch) / 1000;
        format!(
            "[{:02}:{:02}:{:02}]",
            (secs / 3600) % 100,
            (secs / 60) % 60,
            secs % 60
        )
    }

    fn push(&self, message: &str) {
        let stamp = self.stamp();
        if let Ok(mut b) = self.buf.lock() {
            b.output.push_str(&format!("{stamp} - {message}\n"));
            b.entries.push(message.to_string());
        }
    }
}

impl LogSink for MemoryLog {
    fn append_text(&self, message: &str) {
        self.push(message);
    }
}
