//! File journal
//!
//! JSON-lines writer fed through a bounded channel and drained by a
//! dedicated thread, so the hot path never touches the filesystem. A full
//! buffer drops the record with an error log; stalling the engine is worse
//! than losing a journal line. The writer flushes and joins on drop.

use crate::journal::{Journal, JournalEntry, JournalRecord};
use crate::time::Clock;
use crossbeam::channel::{bounded, Receiver, Sender};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use tracing::{error, info};

pub struct FileJournal {
    sender: Option<Sender<JournalEntry>>,
    writer: Option<thread::JoinHandle<()>>,
    clock: Arc<dyn Clock>,
}

impl FileJournal {
    pub fn new(path: PathBuf, buffer: usize, clock: Arc<dyn Clock>) -> std::io::Result<Self> {
        // Open eagerly so a bad path fails at construction, not in the
        // writer thread.
        OpenOptions::new().create(true).append(true).open(&path)?;

        let (sender, receiver) = bounded(buffer.max(1));
        let writer = thread::Builder::new()
            .name("journal-writer".to_string())
            .spawn(move || Self::writer_loop(path, receiver))?;

        Ok(Self {
            sender: Some(sender),
            writer: Some(writer),
            clock,
        })
    }

    fn writer_loop(path: PathBuf, receiver: Receiver<JournalEntry>) {
        let mut file = match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(f) => f,
            Err(err) => {
                error!(?path, %err, "journal writer failed to open file");
                return;
            }
        };

        for entry in receiver {
            match serde_json::to_string(&entry) {
                Ok(line) => {
                    if let Err(err) = writeln!(file, "{line}") {
                        error!(%err, "journal write failed");
                    }
                }
                Err(err) => error!(%err, "journal entry failed to serialize"),
            }
        }

        if let Err(err) = file.flush() {
            error!(%err, "journal flush failed");
        }
        info!("journal writer stopped");
    }
}

impl Journal for FileJournal {
    fn append(&self, record: JournalRecord) {
        let Some(sender) = &self.sender else { return };
        let entry = JournalEntry {
            ts_ns: self.clock.now_ns(),
            record,
        };
        if let Err(err) = sender.try_send(entry) {
            error!(%err, "journal buffer full, record dropped");
        }
    }
}

impl Drop for FileJournal {
    fn drop(&mut self) {
        // Disconnect first, otherwise the writer blocks on recv forever.
        drop(self.sender.take());
        if let Some(handle) = self.writer.take() {
            let _ = handle.join();
        }
    }
}
