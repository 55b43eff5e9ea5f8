use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Local;
use tracing::{info, warn};

use crate::events::{Reporter, SpecEvent};

/// Append-only JSONL record of a session, one event per line
pub struct AuditLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl AuditLog {
    /// Open `audit_<YYYYmmdd_HHMMSS>.jsonl` in `dir`, creating the directory.
    pub fn create(dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let name = format!("audit_{}.jsonl", Local::now().format("%Y%m%d_%H%M%S"));
        let path = dir.join(name);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "audit log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn record(&self, event: &SpecEvent) -> io::Result<()> {
        let mut value = serde_json::to_value(event)?;
        if let Some(fields) = value.as_object_mut() {
            fields.insert(
                "timestamp".to_string(),
                serde_json::Value::String(Local::now().to_rfc3339()),
            );
        }
        let line = serde_json::to_string(&value)?;

        let Ok(mut file) = self.file.lock() else {
            return Err(io::Error::new(io::ErrorKind::Other, "audit log lock poisoned"));
        };
        writeln!(file, "{}", line)?;
        file.flush()
    }
}

impl Reporter for AuditLog {
    fn emit(&self, event: &SpecEvent) {
        if let Err(e) = self.record(event) {
            warn!(path = %self.path.display(), error = %e, "failed to write audit event");
        }
    }
}
