//! Audit sinks.
//!
//! Each sink receives every record independently; one sink's failure never
//! affects another's delivery, and no sink failure ever reaches the caller
//! of `enforce`.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use thiserror::Error;

use crate::record::AuditRecord;

/// Errors a sink can report back to the dispatcher.
///
/// The dispatcher logs these; they are never propagated to the governed
/// operation.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("failed to serialize audit record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write audit record: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit delivery queue is closed")]
    QueueClosed,
}

/// Result type for sink delivery.
pub type Result<T> = std::result::Result<T, SinkError>;

/// A destination for decision audit records.
pub trait DecisionSink: Send + Sync {
    /// Sink name for logging (`stdout`, `file`, `http`).
    fn name(&self) -> &'static str;

    /// Delivers one record. `stdout`/`file` deliver synchronously; `http`
    /// enqueues and returns immediately.
    fn deliver(&self, record: &AuditRecord) -> Result<()>;
}

// ============================================================================
// Stdout
// ============================================================================

/// Writes each record as one structured line to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl DecisionSink for StdoutSink {
    fn name(&self) -> &'static str {
        "stdout"
    }

    fn deliver(&self, record: &AuditRecord) -> Result<()> {
        let line = record.to_canonical_line()?;
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        writeln!(handle, "{line}")?;
        Ok(())
    }
}

// ============================================================================
// File
// ============================================================================

/// Appends one JSON record per line to a local file.
#[derive(Debug)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

impl DecisionSink for FileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    fn deliver(&self, record: &AuditRecord) -> Result<()> {
        let line = record.to_canonical_line()?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}

// ============================================================================
// Http
// ============================================================================

const HTTP_MAX_ATTEMPTS: u32 = 3;
const HTTP_BACKOFF_BASE: Duration = Duration::from_millis(100);
const HTTP_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// POSTs each record to a configured URL from a dedicated worker thread.
///
/// Delivery is fire-and-forget: `deliver` enqueues and returns, so sink
/// latency or unavailability never adds latency to the enforcement path.
/// The worker retries each record up to 3 times with exponential backoff;
/// exhausted deliveries are dropped and counted.
pub struct HttpSink {
    sender: Mutex<Option<mpsc::Sender<String>>>,
    worker: Option<thread::JoinHandle<()>>,
    dropped: Arc<AtomicU64>,
    url: String,
}

impl HttpSink {
    pub fn new(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Self {
        let url = url.into();
        let (sender, receiver) = mpsc::channel::<String>();
        let dropped = Arc::new(AtomicU64::new(0));

        let worker = {
            let url = url.clone();
            let headers = headers.clone();
            let dropped = Arc::clone(&dropped);
            thread::spawn(move || deliver_loop(&url, &headers, &receiver, &dropped))
        };

        Self {
            sender: Mutex::new(Some(sender)),
            worker: Some(worker),
            dropped,
            url,
        }
    }

    /// Deliveries dropped after exhausting retries.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// A handle to the drop counter that outlives the sink (for metrics).
    pub fn dropped_counter(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.dropped)
    }
}

impl DecisionSink for HttpSink {
    fn name(&self) -> &'static str {
        "http"
    }

    fn deliver(&self, record: &AuditRecord) -> Result<()> {
        let line = record.to_canonical_line()?;
        let guard = self.sender.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        match guard.as_ref() {
            Some(sender) => sender.send(line).map_err(|_| SinkError::QueueClosed),
            None => Err(SinkError::QueueClosed),
        }
    }
}

impl Drop for HttpSink {
    /// Closes the queue and waits for in-flight deliveries to finish.
    fn drop(&mut self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::error!(url = %self.url, "http audit worker panicked");
            }
        }
    }
}

fn deliver_loop(
    url: &str,
    headers: &BTreeMap<String, String>,
    receiver: &mpsc::Receiver<String>,
    dropped: &AtomicU64,
) {
    let client = match reqwest::blocking::Client::builder()
        .timeout(HTTP_REQUEST_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(err) => {
            tracing::error!(url = %url, error = %err, "http audit client failed to build");
            // Drain and count everything; the sink is unusable.
            for _ in receiver.iter() {
                dropped.fetch_add(1, Ordering::Relaxed);
            }
            return;
        }
    };

    // iter() blocks until the sender side closes, then drains and exits.
    for body in receiver.iter() {
        if !post_with_retry(&client, url, headers, &body) {
            let total = dropped.fetch_add(1, Ordering::Relaxed) + 1;
            tracing::warn!(
                url = %url,
                dropped_total = total,
                "audit delivery dropped after retries"
            );
        }
    }
}

fn post_with_retry(
    client: &reqwest::blocking::Client,
    url: &str,
    headers: &BTreeMap<String, String>,
    body: &str,
) -> bool {
    for attempt in 0..HTTP_MAX_ATTEMPTS {
        if attempt > 0 {
            thread::sleep(HTTP_BACKOFF_BASE * 2_u32.pow(attempt - 1));
        }

        let mut request = client
            .post(url)
            .header("content-type", "application/json")
            .body(body.to_string());
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        match request.send() {
            Ok(response) if response.status().is_success() => return true,
            Ok(response) => {
                tracing::debug!(
                    url = %url,
                    status = %response.status(),
                    attempt,
                    "audit delivery rejected"
                );
            }
            Err(err) => {
                tracing::debug!(url = %url, error = %err, attempt, "audit delivery failed");
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::ChainState;
    use chrono::Utc;
    use palisade_engine::Decision;
    use palisade_types::{Effect, EnforcementMode};
    use std::io::{BufRead, BufReader, Read, Write as _};
    use std::net::TcpListener;
    use uuid::Uuid;

    fn record() -> AuditRecord {
        let decision = Decision {
            request_id: Uuid::new_v4(),
            effect: Effect::Allow,
            matched_rule_ids: Vec::new(),
            excepted_rule_ids: Vec::new(),
            message: String::new(),
            severity: None,
            remediation: None,
            mutations_applied: Vec::new(),
            warnings: Vec::new(),
            timestamp: Utc::now(),
            principal: "alice".to_string(),
            resource_type: "Risk".to_string(),
            resource_id: None,
            mode: EnforcementMode::Enforce,
            policy: "default/test@1".to_string(),
        };
        ChainState::new().append(&decision, 30)
    }

    #[test]
    fn test_file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let sink = FileSink::new(&path);

        sink.deliver(&record()).unwrap();
        sink.deliver(&record()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let parsed: AuditRecord = serde_json::from_str(line).unwrap();
            assert_eq!(parsed.decision.principal, "alice");
        }
    }

    #[test]
    fn test_http_sink_delivers_to_local_server() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some(rest) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = rest.trim().parse().unwrap();
                }
                if line == "\r\n" {
                    break;
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).unwrap();
            stream
                .write_all(b"HTTP/1.1 200 OK\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .unwrap();
            String::from_utf8(body).unwrap()
        });

        let sink = HttpSink::new(format!("http://{addr}/audit"), &BTreeMap::new());
        sink.deliver(&record()).unwrap();
        drop(sink); // joins the worker, flushing the queue

        let body = server.join().unwrap();
        let parsed: AuditRecord = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.sequence, 0);
    }

    #[test]
    fn test_http_sink_counts_dropped_deliveries() {
        // Bind then drop to get a port nothing listens on.
        let addr = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap()
        };

        let sink = HttpSink::new(format!("http://{addr}/audit"), &BTreeMap::new());
        let counter = sink.dropped_counter();
        sink.deliver(&record()).unwrap();
        drop(sink);

        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
