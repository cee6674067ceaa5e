//! Append-only, human-readable run progress log.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::Result;

pub const STATUS_LOG: &str = "status.log";

pub struct StatusLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl StatusLog {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// `status.log` inside `run_dir`.
    pub fn in_dir(run_dir: &Path) -> Result<Self> {
        Self::open(&run_dir.join(STATUS_LOG))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one timestamped line.
    pub fn log(&self, message: impl AsRef<str>) -> Result<()> {
        let line = format!("[{}] {}\n", Utc::now().format("%Y-%m-%dT%H:%M:%SZ"), message.as_ref());
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    pub fn warn(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(format!("WARNING: {}", message.as_ref()))
    }

    pub fn error(&self, message: impl AsRef<str>) -> Result<()> {
        self.log(format!("ERROR: {}", message.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_are_appended() {
        let dir = tempfile::tempdir().unwrap();
        let log = StatusLog::in_dir(dir.path()).unwrap();
        log.log("started").unwrap();
        log.warn("ash not depleted").unwrap();
        drop(log);

        let again = StatusLog::in_dir(dir.path()).unwrap();
        again.error("hillslope 22 failed").unwrap();

        let text = std::fs::read_to_string(dir.path().join(STATUS_LOG)).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('[') && lines[0].ends_with("] started"));
        assert!(lines[1].contains("WARNING: ash not depleted"));
        assert!(lines[2].contains("ERROR: hillslope 22 failed"));
    }
}
