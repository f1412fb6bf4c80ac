//! Files on the device.

use crate::error::{ExportError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use ucm_data::ExportRecord;

#[derive(Debug, Default)]
pub struct LocalWriteReport {
    pub written: Vec<PathBuf>,
    /// File name and reason of every record that could not be written.
    pub failures: Vec<(String, ExportError)>,
}

impl LocalWriteReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Device tables live at the root, everything else under `<task>/<user>/`.
    pub fn directory_for(&self, record: &ExportRecord) -> Result<PathBuf> {
        if !record.table.is_per_user() {
            return Ok(self.root.clone());
        }
        let task = record
            .meta
            .task
            .as_deref()
            .ok_or(ExportError::MissingMetadata("task"))?;
        let user = record
            .meta
            .user
            .as_deref()
            .ok_or(ExportError::MissingMetadata("user"))?;
        Ok(self.root.join(task.replace(' ', "_")).join(user))
    }

    pub fn write(&self, record: &ExportRecord) -> Result<PathBuf> {
        let dir = self.directory_for(record)?;
        fs::create_dir_all(&dir).map_err(|source| ExportError::Io {
            path: dir.clone(),
            source,
        })?;
        let path = dir.join(record.filename());
        fs::write(&path, &record.payload).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(path = %path.display(), "data set written");
        Ok(path)
    }

    /// Writes every record; a failing record does not stop the others.
    pub fn write_all(&self, records: &[ExportRecord]) -> LocalWriteReport {
        let mut report = LocalWriteReport::default();
        for record in records {
            match self.write(record) {
                Ok(path) => report.written.push(path),
                Err(e) => {
                    warn!(table = %record.table, error = %e, "failed to write data set");
                    report.failures.push((record.filename(), e));
                }
            }
        }
        report
    }

    /// Deletes every folder named after `user` below the root, in all tasks.
    /// Returns the number of folders removed.
    pub fn remove_user_data(&self, user: &str) -> Result<usize> {
        if user.is_empty() || !self.root.exists() {
            return Ok(0);
        }
        let mut found = Vec::new();
        collect_dirs_named(&self.root, user, &mut found)?;
        let mut removed = 0;
        for dir in found {
            match fs::remove_dir_all(&dir) {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %dir.display(), error = %e, "could not remove user folder"),
            }
        }
        info!(user, removed, "removed local user data");
        Ok(removed)
    }
}

fn collect_dirs_named(dir: &Path, name: &str, found: &mut Vec<PathBuf>) -> Result<()> {
    let entries = fs::read_dir(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if entry.file_name() == name {
            found.push(path);
        } else {
            collect_dirs_named(&path, name, found)?;
        }
    }
    Ok(())
}
