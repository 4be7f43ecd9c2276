// src/staging/stager.rs

use std::io::Read;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use flate2::read::ZlibDecoder;
use tracing::{debug, info, warn};

use crate::errors::{Result, WorkerError};
use crate::fs::FileSystem;
use crate::staging::snapshot::DirectorySnapshot;
use crate::workitem::FileRef;

/// Moves workitem files in and out of the task's working directory.
#[derive(Debug, Clone)]
pub struct FileStager {
    fs: Arc<dyn FileSystem>,
    workdir: PathBuf,
}

impl FileStager {
    pub fn new(fs: Arc<dyn FileSystem>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    pub fn snapshot(&self) -> Result<DirectorySnapshot> {
        Ok(DirectorySnapshot::capture(self.fs.as_ref(), &self.workdir)?)
    }

    /// Write every inbound file into the working directory, overwriting files
    /// of the same name.
    ///
    /// A filename must be a single plain name; anything with a directory
    /// part, `..` or a root is rejected before any content is fetched.
    ///
    /// Files without inline content are fetched through `download`. The first
    /// failure aborts the call; files already written stay on disk and are
    /// picked up by [`collect_outbound`](Self::collect_outbound) like any
    /// other file created during the attempt.
    pub async fn materialize_inbound<F, Fut>(&self, files: &[FileRef], download: F) -> Result<()>
    where
        F: Fn(String) -> Fut,
        Fut: std::future::Future<Output = Result<Vec<u8>>>,
    {
        for file_ref in files {
            let name = plain_file_name(&file_ref.filename)?;
            let bytes = match file_ref.inline_content() {
                Some(inline) if file_ref.compressed => inflate(inline)
                    .with_context(|| format!("decompressing inbound file {}", file_ref.filename))?,
                Some(inline) => inline.to_vec(),
                None => {
                    debug!(file = %file_ref.filename, id = %file_ref.id, "downloading inbound file");
                    download(file_ref.id.clone()).await?
                }
            };

            let target = self.workdir.join(name);
            self.fs
                .write(&target, &bytes)
                .with_context(|| format!("materializing inbound file {}", file_ref.filename))?;
            debug!(file = %file_ref.filename, bytes = bytes.len(), "materialized inbound file");
        }
        Ok(())
    }

    /// Every regular file in the working directory that is not in `before`.
    ///
    /// Order follows the directory listing and is not guaranteed.
    pub fn collect_outbound(&self, before: &DirectorySnapshot) -> Result<Vec<PathBuf>> {
        let after = self.snapshot()?;
        let outbound: Vec<PathBuf> = after
            .created_since(before)
            .map(|name| self.workdir.join(name))
            .collect();

        for path in &outbound {
            info!(file = %path.display(), "uploading {}", display_name(path));
        }
        Ok(outbound)
    }

    /// Delete `files`, best effort.
    ///
    /// Failures are logged and skipped; the files were already handed to the
    /// queue service.
    pub fn cleanup(&self, files: &[PathBuf]) {
        for path in files {
            match self.fs.remove_file(path) {
                Ok(()) => debug!(file = %path.display(), "removed outbound file"),
                Err(e) => warn!(file = %path.display(), error = %e, "failed to remove outbound file"),
            }
        }
    }
}

/// `name` as a path with exactly one normal component.
fn plain_file_name(name: &str) -> Result<&Path> {
    let path = Path::new(name);
    let mut components = path.components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(path),
        _ => Err(WorkerError::FileStaging(format!(
            "inbound filename {name:?} is not a plain file name"
        ))),
    }
}

/// Decompress zlib data.
pub fn inflate(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(compressed).read_to_end(&mut out)?;
    Ok(out)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
