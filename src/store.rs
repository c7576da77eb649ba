use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::table::Table;

/// An uploaded file reduced to its first sheet's table text
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredFile {
    pub name: String,
    pub raw_table: String,
    pub uploaded_at: DateTime<Utc>,
}

impl StoredFile {
    pub fn new(name: &str, raw_table: &str) -> Self {
        StoredFile {
            name: name.to_string(),
            raw_table: raw_table.to_string(),
            uploaded_at: Utc::now(),
        }
    }

    pub fn table(&self) -> Table {
        Table::parse(&self.raw_table)
    }

    /// Number of data rows, header excluded
    pub fn row_count(&self) -> usize {
        self.table().rows.len()
    }
}

/// Uploaded files keyed by name, in upload order
///
/// A re-upload under an existing name replaces that entry where it stands;
/// new names are appended.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileStore {
    files: Vec<StoredFile>,
}

impl FileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, file: StoredFile) {
        match self.files.iter_mut().find(|f| f.name == file.name) {
            Some(existing) => {
                log::info!("replacing stored file '{}'", file.name);
                *existing = file;
            }
            None => {
                log::info!("storing new file '{}'", file.name);
                self.files.push(file);
            }
        }
    }

    /// Returns whether a file with that name existed.
    pub fn delete(&mut self, name: &str) -> bool {
        let before = self.files.len();
        self.files.retain(|f| f.name != name);
        let removed = self.files.len() != before;
        if removed {
            log::info!("deleted stored file '{}'", name);
        }
        removed
    }

    pub fn list(&self) -> &[StoredFile] {
        &self.files
    }

    pub fn get(&self, name: &str) -> Option<&StoredFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Time of the most recent upload, if any
    pub fn last_upload(&self) -> Option<DateTime<Utc>> {
        self.files.iter().map(|f| f.uploaded_at).max()
    }

    pub fn to_blob(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Rebuild a store from a blob written by [`FileStore::to_blob`].
    ///
    /// The blob is only a cache of uploads, so anything unreadable gives an
    /// empty store instead of an error.
    pub fn from_blob(blob: &str) -> Self {
        match serde_json::from_str::<FileStore>(blob) {
            Ok(store) => store,
            Err(e) => {
                log::warn!("discarding unreadable store blob: {}", e);
                FileStore::new()
            }
        }
    }
}
