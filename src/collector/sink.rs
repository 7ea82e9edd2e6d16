//! Append-only record output
//!
//! Every worker writes through one [`RecordSink`]. A single mutex guards
//! the file, and console logging from workers runs under the same mutex
//! via [`RecordSink::serialized`], so neither output tears under
//! concurrent workers.
//!
//! Each record is written and flushed as one `host,field\n` line inside
//! the lock. Once the run is cancelled the sink silently drops further
//! records.

use crate::collector::cancel::CancelToken;
use crate::error::{SinkError, SinkResult};
use parking_lot::Mutex;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// One successful result: the host and the extracted field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Host the field was collected from
    pub host: String,

    /// Extracted field value
    pub field: String,
}

impl Record {
    /// Create a record
    pub fn new(host: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            field: field.into(),
        }
    }

    /// Render as one output line
    ///
    /// Line breaks inside the values are flattened to spaces so the record
    /// always occupies exactly one line.
    pub fn to_line(&self) -> String {
        format!("{},{}\n", single_line(&self.host), single_line(&self.field))
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

/// Write-side state guarded by the sink lock
struct SinkState {
    writer: Option<BufWriter<File>>,
}

/// Serialized writer for collected records
pub struct RecordSink {
    state: Mutex<SinkState>,
    path: PathBuf,
    written: AtomicU64,
    cancel: CancelToken,
}

impl RecordSink {
    /// Create (or truncate) the output file
    pub fn create(path: &Path, cancel: CancelToken) -> SinkResult<Self> {
        let file = File::create(path).map_err(|e| SinkError::CreateFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        debug!(path = %path.display(), "Output file created");

        Ok(Self {
            state: Mutex::new(SinkState {
                writer: Some(BufWriter::new(file)),
            }),
            path: path.to_path_buf(),
            written: AtomicU64::new(0),
            cancel,
        })
    }

    /// Append one record as a single flushed line
    ///
    /// Returns `Ok(false)` without writing if the run has been cancelled.
    pub fn append(&self, record: &Record) -> SinkResult<bool> {
        let mut state = self.state.lock();

        if self.cancel.is_cancelled() {
            return Ok(false);
        }

        let writer = state.writer.as_mut().ok_or(SinkError::Closed)?;
        writer.write_all(record.to_line().as_bytes())?;
        writer.flush()?;

        self.written.fetch_add(1, Ordering::Relaxed);
        Ok(true)
    }

    /// Run `f` while holding the output lock
    ///
    /// Used for console output that must not interleave with record writes.
    /// `f` must not call back into the sink.
    pub fn serialized<R>(&self, f: impl FnOnce() -> R) -> R {
        let _state = self.state.lock();
        f()
    }

    /// Flush and close the file
    ///
    /// A second close reports [`SinkError::Closed`].
    pub fn close(&self) -> SinkResult<()> {
        let mut state = self.state.lock();
        let mut writer = state.writer.take().ok_or(SinkError::Closed)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;

        debug!(
            path = %self.path.display(),
            records = self.records_written(),
            "Output file closed"
        );
        Ok(())
    }

    /// Records written so far
    pub fn records_written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::cancel::AbortReason;
    use std::sync::Arc;
    use std::thread;
    use tempfile::tempdir;

    #[test]
    fn test_record_line() {
        assert_eq!(Record::new("10.0.0.1", "ABC123").to_line(), "10.0.0.1,ABC123\n");
        assert_eq!(Record::new("sw1", "A\r\nB").to_line(), "sw1,A  B\n");
    }

    #[test]
    fn test_create_truncates() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("serials.txt");
        std::fs::write(&path, "stale,line\n").unwrap();

        let sink = RecordSink::create(&path, CancelToken::new()).unwrap();
        sink.append(&Record::new("10.0.0.1", "ABC123")).unwrap();
        sink.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10.0.0.1,ABC123\n");
    }

    #[test]
    fn test_close_once() {
        let dir = tempdir().unwrap();
        let sink = RecordSink::create(&dir.path().join("out.txt"), CancelToken::new()).unwrap();
        sink.close().unwrap();

        assert!(matches!(sink.close(), Err(SinkError::Closed)));
        assert!(matches!(
            sink.append(&Record::new("h", "f")),
            Err(SinkError::Closed)
        ));
    }

    #[test]
    fn test_no_writes_after_cancel() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let cancel = CancelToken::new();
        let sink = RecordSink::create(&path, cancel.clone()).unwrap();

        assert!(sink.append(&Record::new("a", "1")).unwrap());
        cancel.abort(AbortReason::AuthFailed { host: "b".into() });
        assert!(!sink.append(&Record::new("c", "3")).unwrap());
        sink.close().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,1\n");
        assert_eq!(sink.records_written(), 1);
    }

    #[test]
    fn test_concurrent_lines_are_whole() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.txt");
        let sink = Arc::new(RecordSink::create(&path, CancelToken::new()).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|w| {
                let sink = Arc::clone(&sink);
                thread::spawn(move || {
                    for i in 0..200 {
                        let field = format!("SN{}-{}", w, "X".repeat(i % 50));
                        sink.append(&Record::new(format!("10.{}.0.{}", w, i), field))
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        sink.close().unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 1600);
        for line in lines {
            let (host, field) = line.split_once(',').unwrap();
            assert!(host.starts_with("10."));
            assert!(field.starts_with("SN"));
            assert!(!field.contains(','));
        }
    }
}
