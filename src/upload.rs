use serde::Serialize;

use crate::error::{Error, Result};
use crate::extract::{ExtractedTable, extract_table};
use crate::store::FileStore;

/// Raw bytes of one selected file
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        UploadedFile {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadState {
    Success,
    Error,
}

/// Per-file result of a batch upload, in batch order
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct UploadStatus {
    pub file_name: String,
    pub status: UploadState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadStatus {
    pub fn is_success(&self) -> bool {
        self.status == UploadState::Success
    }
}

/// Extract every file of a batch concurrently.
///
/// Results come back in batch order no matter which extraction finishes
/// first.
pub async fn extract_batch(files: Vec<UploadedFile>) -> Vec<(String, Result<ExtractedTable>)> {
    let handles: Vec<_> = files
        .into_iter()
        .map(|file| {
            let name = file.name.clone();
            let handle =
                tokio::task::spawn_blocking(move || extract_table(&file.name, &file.bytes));
            (name, handle)
        })
        .collect();

    let mut extracted = Vec::with_capacity(handles.len());
    for (name, handle) in handles {
        let result = match handle.await {
            Ok(result) => result,
            Err(e) => Err(Error::extraction(&name, e)),
        };
        extracted.push((name, result));
    }
    extracted
}

/// Upsert the successful extractions, in order, and report every file.
pub fn apply_batch(
    store: &mut FileStore,
    extracted: Vec<(String, Result<ExtractedTable>)>,
) -> Vec<UploadStatus> {
    extracted
        .into_iter()
        .map(|(file_name, result)| match result {
            Ok(table) => {
                store.upsert(table.into());
                UploadStatus {
                    file_name,
                    status: UploadState::Success,
                    message: None,
                }
            }
            Err(e) => {
                log::warn!("upload failed: {}", e);
                UploadStatus {
                    file_name,
                    status: UploadState::Error,
                    message: Some(e.to_string()),
                }
            }
        })
        .collect()
}

/// Extract a whole batch, then update the store once all files are read.
pub async fn ingest_batch(store: &mut FileStore, files: Vec<UploadedFile>) -> Vec<UploadStatus> {
    let extracted = extract_batch(files).await;
    apply_batch(store, extracted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredFile;

    #[tokio::test]
    async fn bad_file_does_not_abort_batch() {
        let mut store = FileStore::new();
        let statuses = ingest_batch(
            &mut store,
            vec![
                UploadedFile::new("a.csv", "A\n1"),
                UploadedFile::new("broken.xlsx", "nope"),
                UploadedFile::new("b.csv", "B\n2"),
            ],
        )
        .await;

        let ok: Vec<bool> = statuses.iter().map(UploadStatus::is_success).collect();
        assert_eq!(ok, vec![true, false, true]);
        assert_eq!(statuses[1].file_name, "broken.xlsx");

        let names: Vec<&str> = store.list().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
    }

    #[tokio::test]
    async fn reupload_replaces_existing_entry() {
        let mut store = FileStore::new();
        store.upsert(StoredFile::new("a.csv", "A\nold"));
        store.upsert(StoredFile::new("z.csv", "Z\n1"));

        ingest_batch(&mut store, vec![UploadedFile::new("a.csv", "A\nnew")]).await;

        assert_eq!(store.len(), 2);
        assert_eq!(store.list()[0].raw_table, "A\nnew");
    }

    #[tokio::test]
    async fn duplicate_names_in_one_batch_keep_the_last() {
        let mut store = FileStore::new();
        ingest_batch(
            &mut store,
            vec![
                UploadedFile::new("a.csv", "A\nfirst"),
                UploadedFile::new("a.csv", "A\nsecond"),
            ],
        )
        .await;
        assert_eq!(store.len(), 1);
        assert_eq!(store.list()[0].raw_table, "A\nsecond");
    }

    #[test]
    fn status_serializes_flat() {
        let status = UploadStatus {
            file_name: "x.xlsx".into(),
            status: UploadState::Error,
            message: Some("bad".into()),
        };
        assert_eq!(
            serde_json::to_string(&status).unwrap(),
            r#"{"file_name":"x.xlsx","status":"error","message":"bad"}"#
        );
    }
}
