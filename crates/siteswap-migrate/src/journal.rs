use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use siteswap_core::StepOutcome;

use crate::{Activity, FileRelocation, StepReporter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JournalEvent {
    StepStarted {
        number: usize,
        title: String,
    },
    StepFinished {
        number: usize,
        outcome: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    FileRelocated {
        source: String,
        target: String,
        outcome: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    Detail {
        message: String,
    },
}

#[derive(Serialize)]
struct JournalLine<'a> {
    seq: u64,
    at_unix: i64,
    #[serde(flatten)]
    event: &'a JournalEvent,
}

/// Append-only JSON-lines record of a run, kept for diagnosing where a failed run stopped.
#[derive(Debug)]
pub struct RunJournal {
    path: PathBuf,
    file: fs::File,
    seq: u64,
}

impl RunJournal {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("failed to open run journal: {}", path.display()))?;
        Ok(Self { path, file, seq: 0 })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, event: &JournalEvent) -> Result<()> {
        self.seq += 1;
        let line = serde_json::to_string(&JournalLine {
            seq: self.seq,
            at_unix: chrono::Utc::now().timestamp(),
            event,
        })
        .context("failed to serialize journal entry")?;
        self.file
            .write_all(line.as_bytes())
            .and_then(|()| self.file.write_all(b"\n"))
            .and_then(|()| self.file.flush())
            .with_context(|| format!("failed to append run journal: {}", self.path.display()))
    }
}

pub fn default_journal_path() -> Result<PathBuf> {
    let state_dir = if cfg!(windows) {
        let app_data = std::env::var("LOCALAPPDATA")
            .context("LOCALAPPDATA is not set; cannot resolve journal directory")?;
        PathBuf::from(app_data).join("Siteswap")
    } else {
        let home = std::env::var("HOME").context("HOME is not set; cannot resolve journal directory")?;
        PathBuf::from(home).join(".siteswap")
    };
    Ok(state_dir.join("runs").join(format!(
        "run-{}-{}.journal",
        chrono::Utc::now().timestamp(),
        std::process::id()
    )))
}

/// Forwards every event to `inner` and mirrors it into a journal. A journal write
/// failure is logged once and journaling stops; the run itself continues.
pub struct JournalingReporter<R> {
    inner: R,
    journal: Option<RunJournal>,
}

impl<R: StepReporter> JournalingReporter<R> {
    pub fn new(inner: R, journal: Option<RunJournal>) -> Self {
        Self { inner, journal }
    }

    pub fn inner(&self) -> &R {
        &self.inner
    }

    pub fn journal_path(&self) -> Option<&Path> {
        self.journal.as_ref().map(RunJournal::path)
    }

    fn record(&mut self, event: JournalEvent) {
        let Some(journal) = self.journal.as_mut() else {
            return;
        };
        if let Err(err) = journal.append(&event) {
            tracing::warn!(error = %format!("{err:#}"), "run journal disabled after write failure");
            self.journal = None;
        }
    }
}

impl<R: StepReporter> StepReporter for JournalingReporter<R> {
    fn step_started(&mut self, number: usize, title: &str) {
        self.inner.step_started(number, title);
        self.record(JournalEvent::StepStarted {
            number,
            title: title.to_string(),
        });
    }

    fn step_detail(&mut self, message: &str) {
        self.inner.step_detail(message);
        self.record(JournalEvent::Detail {
            message: message.to_string(),
        });
    }

    fn step_finished(&mut self, number: usize, outcome: &StepOutcome) {
        self.inner.step_finished(number, outcome);
        self.record(JournalEvent::StepFinished {
            number,
            outcome: outcome.as_str(),
            reason: outcome.reason().map(str::to_string),
        });
    }

    fn file_relocated(&mut self, relocation: &FileRelocation) {
        self.inner.file_relocated(relocation);
        self.record(JournalEvent::FileRelocated {
            source: relocation.source.as_str().to_string(),
            target: relocation.target.as_str().to_string(),
            outcome: relocation.outcome.as_str(),
            reason: relocation.outcome.reason().map(str::to_string),
        });
    }

    fn start_activity(&mut self, label: &str) -> Box<dyn Activity> {
        self.inner.start_activity(label)
    }
}
