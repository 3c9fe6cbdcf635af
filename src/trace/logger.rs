use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::warn;

use crate::trace::trace::TraceEvent;

/// JSONL sink for [`TraceEvent`]s. Writes are best effort: a run never
/// fails because its trace could not be written.
pub struct TraceLogger {
    path: PathBuf,
    sink: Mutex<File>,
}

impl TraceLogger {
    /// Open `path` for appending. `None` when it cannot be opened, in which
    /// case the run goes untraced.
    pub fn open(path: impl AsRef<Path>) -> Option<Self> {
        let path = path.as_ref().to_path_buf();
        match OpenOptions::new().create(true).append(true).open(&path) {
            Ok(file) => Some(Self {
                path,
                sink: Mutex::new(file),
            }),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "trace disabled, cannot open file");
                None
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn log(&self, event: &TraceEvent) {
        let line = match serde_json::to_string(event) {
            Ok(line) => line,
            Err(e) => {
                warn!(stage = ?event.stage, error = %e, "trace event not serializable");
                return;
            }
        };

        let Ok(mut sink) = self.sink.lock() else {
            warn!(path = %self.path.display(), "trace sink poisoned");
            return;
        };
        if let Err(e) = writeln!(sink, "{line}") {
            warn!(path = %self.path.display(), error = %e, "trace write failed");
        }
    }
}
