//! Append-only, timestamped record of everything the batch did.

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info};

use crate::error::Result;

/// Destination for journal entries. Writes must keep their order.
pub trait EventSink: Send + Sync {
    fn record(&self, timestamp: DateTime<Local>, message: &str) -> Result<()>;
}

/// Appends `[timestamp] message` lines to a file.
pub struct FileSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl FileSink {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl EventSink for FileSink {
    fn record(&self, timestamp: DateTime<Local>, message: &str) -> Result<()> {
        let line = format!("[{}] {}\n", timestamp.format("%Y-%m-%d %H:%M:%S"), message);
        let mut file = self.file.lock();
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Keeps entries in memory, for inspection after a run.
#[derive(Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(DateTime<Local>, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.entries.lock().iter().map(|(_, m)| m.clone()).collect()
    }
}

impl EventSink for MemorySink {
    fn record(&self, timestamp: DateTime<Local>, message: &str) -> Result<()> {
        self.entries.lock().push((timestamp, message.to_string()));
        Ok(())
    }
}

/// Stamps messages and forwards them to the sink and to tracing.
#[derive(Clone)]
pub struct Journal {
    sink: Arc<dyn EventSink>,
}

impl Journal {
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self { sink }
    }

    pub fn in_memory() -> (Self, Arc<MemorySink>) {
        let sink = Arc::new(MemorySink::new());
        (Self::new(sink.clone()), sink)
    }

    pub fn record(&self, message: &str) {
        info!("{}", message);
        if let Err(e) = self.sink.record(Local::now(), message) {
            error!(error = %e, "Failed to append journal entry");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sink_keeps_order() {
        let (journal, sink) = Journal::in_memory();
        journal.record("first");
        journal.record("second");
        journal.record("third");
        assert_eq!(sink.messages(), vec!["first", "second", "third"]);
    }

    #[test]
    fn file_sink_appends_timestamped_lines() {
        let path = std::env::temp_dir().join(format!("journal_test_{}.log", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let journal = Journal::new(Arc::new(FileSink::open(&path).unwrap()));
        journal.record("deposit submitted");
        journal.record("deposit confirmed");

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] deposit submitted"));
        assert!(lines[1].ends_with("] deposit confirmed"));

        std::fs::remove_file(&path).unwrap();
    }
}
