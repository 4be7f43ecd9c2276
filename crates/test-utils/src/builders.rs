#![allow(dead_code)]

use std::io::Write;
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use wiqrunner::config::{ConfigFile, RawConfigFile};
use wiqrunner::workitem::{FileRef, Workitem};

/// Default configuration with the task running in `workdir`.
pub fn config_in(workdir: &Path) -> ConfigFile {
    let mut raw = RawConfigFile::default();
    raw.task.workdir = workdir.to_path_buf();
    ConfigFile::try_from(raw).expect("default config is valid")
}

/// Builder for `Workitem` to simplify test setup.
pub struct WorkitemBuilder {
    workitem: Workitem,
}

impl WorkitemBuilder {
    pub fn new(id: &str) -> Self {
        Self {
            workitem: Workitem {
                id: id.to_string(),
                payload: "{}".to_string(),
                ..Workitem::default()
            },
        }
    }

    pub fn payload(mut self, raw: &str) -> Self {
        self.workitem.payload = raw.to_string();
        self
    }

    pub fn retries(mut self, retries: u32) -> Self {
        self.workitem.retries = retries;
        self
    }

    pub fn inline_file(mut self, filename: &str, content: &[u8]) -> Self {
        self.workitem.files.push(FileRef {
            id: format!("inline-{filename}"),
            filename: filename.to_string(),
            file: Some(content.to_vec()),
            compressed: false,
        });
        self
    }

    /// Attach `content` zlib-compressed, with the compression flag set.
    pub fn compressed_file(mut self, filename: &str, content: &[u8]) -> Self {
        self.workitem.files.push(FileRef {
            id: format!("inline-{filename}"),
            filename: filename.to_string(),
            file: Some(zlib(content)),
            compressed: true,
        });
        self
    }

    /// Attach a file that must be downloaded by id.
    pub fn remote_file(mut self, filename: &str, id: &str) -> Self {
        self.workitem.files.push(FileRef {
            id: id.to_string(),
            filename: filename.to_string(),
            file: None,
            compressed: false,
        });
        self
    }

    pub fn build(self) -> Workitem {
        self.workitem
    }
}

/// zlib-compress `content` the way the queue service does.
pub fn zlib(content: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).expect("writing to in-memory encoder");
    encoder.finish().expect("finishing in-memory encoder")
}
