use bincode::Options;
use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::fs;
use std::io::{BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;

use crate::error::{Error, Result};
use crate::store::FileStore;

/// Largest decompressed backup accepted on restore
pub const SNAPSHOT_LIMIT: u64 = 512 * 1024 * 1024;

// fixint + trailing bytes keeps the layout of plain `bincode::serialize`
fn snapshot_options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .allow_trailing_bytes()
        .with_limit(SNAPSHOT_LIMIT)
}

/// Read the store slot at `path`.
///
/// A missing slot is a fresh start and an unreadable one is discarded, so
/// this never fails.
pub fn load_store(path: impl AsRef<Path>) -> FileStore {
    let path = path.as_ref();
    match fs::read_to_string(path) {
        Ok(blob) => FileStore::from_blob(&blob),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileStore::new(),
        Err(e) => {
            log::warn!("could not read store slot {}: {}", path.display(), e);
            FileStore::new()
        }
    }
}

/// Write the whole store into the slot at `path`.
///
/// The blob goes to a sibling temp file first and is renamed over the slot,
/// so a crash mid-write leaves the previous snapshot intact.
pub fn save_store(store: &FileStore, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }

    let blob = store.to_blob()?;
    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(fs::File::create(&tmp)?);
        writer.write_all(blob.as_bytes())?;
        writer.flush()?;
    }
    fs::rename(&tmp, path)?;

    log::debug!("saved {} files to {}", store.len(), path.display());
    Ok(())
}

/// Gzip-compressed bincode backup of the whole store.
pub fn snapshot_to_bytes(store: &FileStore) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    {
        let encoder = GzEncoder::new(&mut buffer, Compression::default());
        let mut writer = BufWriter::new(encoder);
        snapshot_options().serialize_into(&mut writer, store)?;
        let encoder = writer
            .into_inner()
            .map_err(|e| Error::Snapshot(e.to_string()))?;
        encoder.finish()?;
    }
    Ok(buffer)
}

/// Restore a backup made by [`snapshot_to_bytes`].
///
/// Unlike the store slot, a bad backup is reported to the caller. Length
/// prefixes are checked against [`SNAPSHOT_LIMIT`] before anything is
/// allocated for them.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<FileStore> {
    let decoder = GzDecoder::new(Cursor::new(bytes)).take(SNAPSHOT_LIMIT);
    let mut reader = BufReader::new(decoder);
    let store: FileStore = snapshot_options().deserialize_from(&mut reader)?;
    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoredFile;

    fn sample() -> FileStore {
        let mut store = FileStore::new();
        store.upsert(StoredFile::new("sales.csv", "Region\tAmount\nEast\t100"));
        store.upsert(StoredFile::new("fleet.xlsx", "Truck\tDriver\nT1\tAnn"));
        store
    }

    #[test]
    fn slot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let store = sample();

        save_store(&store, &path).unwrap();
        assert_eq!(load_store(&path), store);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_slot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_store(dir.path().join("absent.json")).is_empty());
    }

    #[test]
    fn corrupt_slot_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, b"\x00\x01garbage").unwrap();
        assert!(load_store(&path).is_empty());
    }

    #[test]
    fn snapshot_round_trip() {
        let store = sample();
        let bytes = snapshot_to_bytes(&store).unwrap();
        assert_eq!(&bytes[..2], &[0x1f, 0x8b]);
        assert_eq!(snapshot_from_bytes(&bytes).unwrap(), store);
    }

    #[test]
    fn bad_snapshot_is_an_error() {
        assert!(snapshot_from_bytes(b"not a snapshot").is_err());
    }

    fn gzip(raw: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(raw).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn oversized_length_prefix_is_an_error() {
        // one stored file whose name claims u64::MAX bytes
        let mut raw = Vec::new();
        raw.extend_from_slice(&1u64.to_le_bytes());
        raw.extend_from_slice(&u64::MAX.to_le_bytes());
        raw.extend_from_slice(b"abc");
        assert!(matches!(
            snapshot_from_bytes(&gzip(&raw)),
            Err(Error::Snapshot(_))
        ));

        let mut raw = Vec::new();
        raw.extend_from_slice(&1u64.to_le_bytes());
        raw.extend_from_slice(&(1u64 << 40).to_le_bytes());
        assert!(snapshot_from_bytes(&gzip(&raw)).is_err());
    }

    #[test]
    fn snapshot_matches_plain_bincode_layout() {
        let store = sample();
        let plain = bincode::serialize(&store).unwrap();
        assert_eq!(snapshot_from_bytes(&gzip(&plain)).unwrap(), store);
    }
}
