use crate::error::Result;
use log::info;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The artifact already existed and was left untouched
    Skipped,
}

/// Write-once cache keyed by output path.
///
/// An artifact is produced at most once: if the path already exists on disk, or was
/// written earlier through this cache, the writer closure is never called.
#[derive(Debug, Default)]
pub struct ArtifactCache {
    written: HashSet<PathBuf>,
}

impl ArtifactCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains<P: AsRef<Path>>(&self, path: P) -> bool {
        let path = path.as_ref();
        self.written.contains(path) || path.exists()
    }

    /// Produces the artifact at `path` unless it already exists.
    ///
    /// Content goes to a sibling `.part` file that is renamed into place once `write`
    /// succeeds, so a failed write never leaves a file that would block the next run.
    pub fn write_once<P, F>(&mut self, path: P, write: F) -> Result<WriteOutcome>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut BufWriter<File>) -> Result<()>,
    {
        let path = path.as_ref();
        if self.contains(path) {
            info!("Found {}. Skipping...", path.display());
            return Ok(WriteOutcome::Skipped);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut partial = path.as_os_str().to_owned();
        partial.push(".part");
        let partial = PathBuf::from(partial);

        let mut writer = BufWriter::new(File::create(&partial)?);
        let written = write(&mut writer).and_then(|_| writer.flush().map_err(Into::into));
        drop(writer);
        if let Err(e) = written {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::rename(&partial, path)?;

        self.written.insert(path.to_path_buf());
        Ok(WriteOutcome::Written)
    }
}

/// True when `dir` exists and holds at least one entry
pub fn dir_is_populated<P: AsRef<Path>>(dir: P) -> Result<bool> {
    let dir = dir.as_ref();
    if !dir.is_dir() {
        return Ok(false);
    }
    Ok(fs::read_dir(dir)?.next().is_some())
}
