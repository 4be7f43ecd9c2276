// src/staging/snapshot.rs

use std::collections::BTreeSet;
use std::path::Path;

use anyhow::Result;

use crate::fs::FileSystem;

/// Names of the regular files present in a directory at one point in time.
///
/// Only used as a before/after reference; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectorySnapshot {
    names: BTreeSet<String>,
}

impl DirectorySnapshot {
    /// List the regular files directly inside `dir`.
    ///
    /// Subdirectories and entries whose name is not valid UTF-8 are skipped.
    pub fn capture(fs: &dyn FileSystem, dir: &Path) -> Result<Self> {
        let names = fs
            .read_dir(dir)?
            .into_iter()
            .filter(|path| fs.is_file(path))
            .filter_map(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .map(str::to_string)
            })
            .collect();
        Ok(Self { names })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    /// Names present in `self` but not in `before`.
    pub fn created_since<'a>(&'a self, before: &'a DirectorySnapshot) -> impl Iterator<Item = &'a str> {
        self.names().filter(move |name| !before.contains(name))
    }
}
