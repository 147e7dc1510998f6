use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use uploadd_common::errors::*;
use uploadd_common::{Archive, Pocket};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum QueueDisposition {
    /// Waiting for a human to review a package the archive has never seen.
    New,
    /// Known package, waiting for queue review before publication.
    Unapproved,
    Accepted,
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: usize,
    pub changes_filename: String,
    pub package: String,
    pub version: String,
    pub series: String,
    pub pocket: Pocket,
    pub archive: Archive,
    pub disposition: QueueDisposition,
    pub rejections: Vec<String>,
    pub warnings: Vec<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct NewQueueEntry {
    pub changes_filename: String,
    pub package: String,
    pub version: String,
    pub series: String,
    pub pocket: Pocket,
    pub archive: Archive,
    pub rejections: Vec<String>,
    pub warnings: Vec<String>,
}

/// Write access to the upload queue. The pipeline only ever creates an
/// entry and moves it through its dispositions, everything else is the
/// queue owner's business.
pub trait QueueSink {
    fn create_entry(&mut self, entry: NewQueueEntry) -> Result<usize>;
    fn accept(&mut self, id: usize) -> Result<()>;
    fn set_unapproved(&mut self, id: usize) -> Result<()>;
    fn set_rejected(&mut self, id: usize) -> Result<()>;
}

/// Queue kept in memory. Used by tests and dry runs.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    pub entries: Vec<QueueEntry>,
}

impl MemoryQueue {
    pub fn new() -> MemoryQueue {
        MemoryQueue::default()
    }

    fn entry_mut(&mut self, id: usize) -> Result<&mut QueueEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| format_err!("No queue entry with id {}", id))
    }
}

fn build_entry(id: usize, entry: NewQueueEntry) -> QueueEntry {
    QueueEntry {
        id,
        changes_filename: entry.changes_filename,
        package: entry.package,
        version: entry.version,
        series: entry.series,
        pocket: entry.pocket,
        archive: entry.archive,
        disposition: QueueDisposition::New,
        rejections: entry.rejections,
        warnings: entry.warnings,
        created_at: Utc::now().naive_utc(),
    }
}

impl QueueSink for MemoryQueue {
    fn create_entry(&mut self, entry: NewQueueEntry) -> Result<usize> {
        let id = self.entries.len() + 1;
        self.entries.push(build_entry(id, entry));
        Ok(id)
    }

    fn accept(&mut self, id: usize) -> Result<()> {
        self.entry_mut(id)?.disposition = QueueDisposition::Accepted;
        Ok(())
    }

    fn set_unapproved(&mut self, id: usize) -> Result<()> {
        self.entry_mut(id)?.disposition = QueueDisposition::Unapproved;
        Ok(())
    }

    fn set_rejected(&mut self, id: usize) -> Result<()> {
        self.entry_mut(id)?.disposition = QueueDisposition::Rejected;
        Ok(())
    }
}

/// Queue journaled to disk as one JSON document per line. Every state
/// change appends a line, so the latest line for an id wins on replay.
#[derive(Debug)]
pub struct JournalQueue {
    path: PathBuf,
    entries: Vec<QueueEntry>,
}

impl JournalQueue {
    pub fn new<P: AsRef<Path>>(path: P) -> JournalQueue {
        JournalQueue {
            path: path.as_ref().to_path_buf(),
            entries: Vec::new(),
        }
    }

    fn append(&self, entry: &QueueEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| anyhow!("Failed to open queue journal: {:?}", self.path))?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{}", line).context("Failed to append to queue journal")?;
        Ok(())
    }

    fn transition(&mut self, id: usize, disposition: QueueDisposition) -> Result<()> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| format_err!("No queue entry with id {}", id))?;
        entry.disposition = disposition;
        let entry = entry.clone();
        self.append(&entry)
    }
}

impl QueueSink for JournalQueue {
    fn create_entry(&mut self, entry: NewQueueEntry) -> Result<usize> {
        let id = self.entries.len() + 1;
        let entry = build_entry(id, entry);
        self.append(&entry)?;
        self.entries.push(entry);
        Ok(id)
    }

    fn accept(&mut self, id: usize) -> Result<()> {
        self.transition(id, QueueDisposition::Accepted)
    }

    fn set_unapproved(&mut self, id: usize) -> Result<()> {
        self.transition(id, QueueDisposition::Unapproved)
    }

    fn set_rejected(&mut self, id: usize) -> Result<()> {
        self.transition(id, QueueDisposition::Rejected)
    }
}

/// Tells people about the outcome of their upload. Mail delivery lives
/// outside this crate, the default just writes the report to the log.
pub trait Notifier {
    fn notify_accept(&self, entry: &NewQueueEntry, summary: Option<&str>) -> Result<()>;
    fn notify_reject(&self, entry: &NewQueueEntry, reason: &str) -> Result<()>;
}

pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify_accept(&self, entry: &NewQueueEntry, summary: Option<&str>) -> Result<()> {
        info!(
            "accepted {} ({} {})",
            entry.changes_filename, entry.package, entry.version
        );
        if let Some(summary) = summary {
            info!("{}", summary);
        }
        Ok(())
    }

    fn notify_reject(&self, entry: &NewQueueEntry, reason: &str) -> Result<()> {
        info!(
            "rejected {} ({} {})",
            entry.changes_filename, entry.package, entry.version
        );
        for line in reason.lines() {
            info!("  {}", line);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uploadd_common::ArchiveKind;

    fn entry() -> NewQueueEntry {
        NewQueueEntry {
            changes_filename: "hello_2.10-2_source.changes".to_string(),
            package: "hello".to_string(),
            version: "2.10-2".to_string(),
            series: "crimson".to_string(),
            pocket: Pocket::Release,
            archive: Archive::new("primary".to_string(), ArchiveKind::Primary),
            rejections: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_memory_queue_transitions() {
        let mut queue = MemoryQueue::new();
        let id = queue.create_entry(entry()).unwrap();
        assert_eq!(queue.entries[0].disposition, QueueDisposition::New);
        queue.set_unapproved(id).unwrap();
        assert_eq!(queue.entries[0].disposition, QueueDisposition::Unapproved);
        queue.accept(id).unwrap();
        assert_eq!(queue.entries[0].disposition, QueueDisposition::Accepted);
    }

    #[test]
    fn test_unknown_id() {
        let mut queue = MemoryQueue::new();
        assert!(queue.accept(42).is_err());
    }

    #[test]
    fn test_journal_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.journal");
        let mut queue = JournalQueue::new(&path);
        let id = queue.create_entry(entry()).unwrap();
        queue.set_rejected(id).unwrap();

        let buf = std::fs::read_to_string(&path).unwrap();
        let lines = buf.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        let last = serde_json::from_str::<QueueEntry>(lines[1]).unwrap();
        assert_eq!(last.disposition, QueueDisposition::Rejected);
    }
}
