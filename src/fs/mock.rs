// src/fs/mock.rs

//! In-memory [`FileSystem`] with failure injection, for tests.

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(BTreeSet<String>), // child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    failing_writes: HashSet<PathBuf>,
    failing_removals: HashSet<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

/// `./a/./b` and `a/b` must hit the same entry.
fn normalize(path: &Path) -> PathBuf {
    let cleaned: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if cleaned.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        cleaned
    }
}

fn parent_of(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

impl MockFileSystem {
    pub fn new() -> Self {
        let fs = Self::default();
        {
            let mut state = fs.state.lock().unwrap();
            state
                .entries
                .insert(PathBuf::from("."), MockEntry::Dir(BTreeSet::new()));
        }
        fs
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let path = normalize(path.as_ref());
        let mut state = self.state.lock().unwrap();
        Self::ensure_dir_entry(&mut state.entries, &parent_of(&path));
        Self::link_child(&mut state.entries, &path);
        state.entries.insert(path, MockEntry::File(content.into()));
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let path = normalize(path.as_ref());
        let mut state = self.state.lock().unwrap();
        Self::ensure_dir_entry(&mut state.entries, &path);
    }

    /// Content of a file, if present.
    pub fn contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path.as_ref())) {
            Some(MockEntry::File(bytes)) => Some(bytes.clone()),
            _ => None,
        }
    }

    /// Make every later `write` to `path` fail.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.failing_writes.insert(normalize(path.as_ref()));
    }

    /// Make every later `remove_file` of `path` fail.
    pub fn fail_removals_of(&self, path: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.failing_removals.insert(normalize(path.as_ref()));
    }

    fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if entries.contains_key(path) {
            return;
        }
        entries.insert(path.to_path_buf(), MockEntry::Dir(BTreeSet::new()));
        let parent = parent_of(path);
        if parent != path {
            Self::ensure_dir_entry(entries, &parent);
            Self::link_child(entries, path);
        }
    }

    fn link_child(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        let parent = parent_of(path);
        if let (Some(MockEntry::Dir(children)), Some(name)) = (
            entries.get_mut(&parent),
            path.file_name().and_then(|n| n.to_str()),
        ) {
            children.insert(name.to_string());
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path)) {
            Some(MockEntry::File(content)) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        {
            let state = self.state.lock().unwrap();
            if state.failing_writes.contains(&normalize(path)) {
                return Err(anyhow!("Permission denied: {:?}", path));
            }
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> Result<()> {
        let path = normalize(path);
        let mut state = self.state.lock().unwrap();
        if state.failing_removals.contains(&path) {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        match state.entries.get(&path) {
            Some(MockEntry::File(_)) => {}
            Some(MockEntry::Dir(_)) => return Err(anyhow!("Is a directory: {:?}", path)),
            None => return Err(anyhow!("File not found: {:?}", path)),
        }
        state.entries.remove(&path);
        if let (Some(MockEntry::Dir(children)), Some(name)) = (
            state.entries.get_mut(&parent_of(&path)),
            path.file_name().and_then(|n| n.to_str()),
        ) {
            children.remove(name);
        }
        Ok(())
    }

    fn is_file(&self, path: &Path) -> bool {
        let state = self.state.lock().unwrap();
        matches!(state.entries.get(&normalize(path)), Some(MockEntry::File(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.state.lock().unwrap();
        match state.entries.get(&normalize(path)) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }
}
