//! All-or-nothing artifact writes
//!
//! Every file of a run is staged as a temporary next to its target, then
//! renamed into place. If staging fails nothing is renamed; if a rename fails
//! the files already replaced are restored from their previous content.

use crate::error::WriteError;
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Files to write, keyed by path relative to the repository root
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteSet {
    files: BTreeMap<String, String>,
}

impl WriteSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a file, replacing content staged earlier for the same path
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.files.insert(path.into(), content.into());
    }

    #[inline]
    #[must_use]
    pub fn with_file(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }
}

/// Commits a [`WriteSet`] under one repository root
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
}

struct Staged {
    target: PathBuf,
    temp: NamedTempFile,
    previous: Option<Vec<u8>>,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Write every file of `set` or none of them
    ///
    /// # Errors
    /// Returns error if a path escapes the root or any IO step fails
    pub fn commit(&self, set: &WriteSet) -> Result<Vec<PathBuf>, WriteError> {
        let mut staged = Vec::with_capacity(set.len());
        for (relative, content) in &set.files {
            staged.push(self.stage(relative, content)?);
        }

        let mut written: Vec<(PathBuf, Option<Vec<u8>>)> = Vec::with_capacity(staged.len());
        for Staged {
            target,
            temp,
            previous,
        } in staged
        {
            if let Err(e) = temp.persist(&target) {
                warn!(path = %target.display(), error = %e.error, "rename failed, restoring");
                restore(&written);
                return Err(WriteError::io_error(target, e.error));
            }
            debug!(path = %target.display(), "written");
            written.push((target, previous));
        }

        info!(files = written.len(), "committed artifacts");
        Ok(written.into_iter().map(|(path, _)| path).collect())
    }

    fn stage(&self, relative: &str, content: &str) -> Result<Staged, WriteError> {
        if !stays_inside(relative) {
            return Err(WriteError::OutsideRoot(relative.to_string()));
        }
        let target = self.root.join(relative);
        let parent = target
            .parent()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);
        std::fs::create_dir_all(&parent).map_err(|e| WriteError::io_error(&parent, e))?;

        let previous = match std::fs::read(&target) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(WriteError::io_error(&target, e)),
        };

        let mut temp = NamedTempFile::new_in(&parent).map_err(|e| WriteError::io_error(&parent, e))?;
        temp.write_all(content.as_bytes())
            .and_then(|()| temp.flush())
            .map_err(|e| WriteError::io_error(temp.path(), e))?;
        Ok(Staged {
            target,
            temp,
            previous,
        })
    }
}

fn restore(written: &[(PathBuf, Option<Vec<u8>>)]) {
    for (path, previous) in written.iter().rev() {
        let result = match previous {
            Some(bytes) => std::fs::write(path, bytes),
            None => std::fs::remove_file(path),
        };
        if let Err(e) = result {
            warn!(path = %path.display(), error = %e, "could not restore");
        }
    }
}

fn stays_inside(relative: &str) -> bool {
    !relative.is_empty()
        && Path::new(relative)
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}
