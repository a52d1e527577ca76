//! Filesystem layout and persistence for room archives.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::{ArchiveError, ArchiveRecord, IndexedDocument, Message};

/// Suffix distinguishing the ledger file from the archive file.
const LEDGER_SUFFIX: &str = "_docs";

/// Owns the on-disk archive tree.
///
/// Rooms are addressed by their filesystem-safe uri; `/`-delimited subgroups
/// map to nested directories which are created lazily on save. A missing
/// file loads as an empty record, so brand-new rooms need no setup.
pub struct ArchiveStore {
    root: PathBuf,
}

impl ArchiveStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into().join("archive"),
        }
    }

    fn record_path(&self, uri: &str) -> PathBuf {
        self.root.join(format!("{uri}.json"))
    }

    fn ledger_path(&self, uri: &str) -> PathBuf {
        self.root.join(format!("{uri}{LEDGER_SUFFIX}.json"))
    }

    pub fn load(&self, uri: &str) -> Result<ArchiveRecord, ArchiveError> {
        let path = self.record_path(uri);
        if !path.exists() {
            debug!(uri, "no archive on disk, starting empty");
            return Ok(ArchiveRecord::default());
        }
        let messages: Vec<Message> = read_json(&path)?;
        ArchiveRecord::from_messages(messages)
    }

    pub fn load_ledger(&self, uri: &str) -> Result<Vec<IndexedDocument>, ArchiveError> {
        let path = self.ledger_path(uri);
        if !path.exists() {
            return Ok(Vec::new());
        }
        read_json(&path)
    }

    /// Persist the archive and ledger together. Callers only save after a
    /// full room sync, which gives interrupted runs crash-only recovery:
    /// the previous consistent pair stays on disk.
    pub fn save(
        &self,
        uri: &str,
        record: &ArchiveRecord,
        ledger: &[IndexedDocument],
    ) -> Result<(), ArchiveError> {
        write_json(&self.record_path(uri), record.messages())?;
        write_json(&self.ledger_path(uri), ledger)?;
        Ok(())
    }

    /// Room uris present in the archive tree, discovered by walking it.
    pub fn list_rooms(&self) -> Result<Vec<String>, ArchiveError> {
        let mut uris = Vec::new();
        if self.root.exists() {
            walk(&self.root, &self.root, &mut uris)?;
        }
        uris.sort();
        Ok(uris)
    }
}

fn walk(root: &Path, dir: &Path, uris: &mut Vec<String>) -> Result<(), ArchiveError> {
    let entries = fs::read_dir(dir).map_err(|source| ArchiveError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| ArchiveError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, uris)?;
        } else if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            if path.extension().and_then(|e| e.to_str()) != Some("json")
                || stem.ends_with(LEDGER_SUFFIX)
            {
                continue;
            }
            let rel = path
                .strip_prefix(root)
                .expect("walked path is under the root");
            let mut uri = rel.to_string_lossy().into_owned();
            uri.truncate(uri.len() - ".json".len());
            uris.push(uri.replace(std::path::MAIN_SEPARATOR, "/"));
        }
    }
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ArchiveError> {
    let raw = fs::read_to_string(path).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ArchiveError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArchiveError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ArchiveError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut raw = serde_json::to_string_pretty(value).map_err(|source| ArchiveError::Malformed {
        path: path.to_path_buf(),
        source,
    })?;
    raw.push('\n');
    fs::write(path, raw).map_err(|source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, MessageAuthor};
    use chrono::{TimeZone, Utc};
    use tempfile::tempdir;

    fn msg(id: &str) -> Message {
        Message {
            id: id.to_string(),
            sent: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            text: format!("message {id}"),
            author: MessageAuthor {
                username: "alice".to_string(),
                display_name: "Alice".to_string(),
            },
            urls: None,
        }
    }

    fn doc(id: &str) -> IndexedDocument {
        IndexedDocument {
            group_name: "gitterHQ".to_string(),
            room_name: "sandbox".to_string(),
            display_name: "Alice".to_string(),
            username: "alice".to_string(),
            message: format!("message {id}"),
            sent: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            permalink: format!("https://gitter.im/gitterHQ/sandbox?at={id}"),
        }
    }

    #[test]
    fn test_save_creates_nested_dirs_and_reloads() {
        let tmp = tempdir().unwrap();
        let store = ArchiveStore::new(tmp.path());

        let mut record = ArchiveRecord::default();
        record
            .merge(&[msg("a"), msg("b")], Direction::Backward)
            .unwrap();
        store
            .save("gitterHQ/sandbox", &record, &[doc("a"), doc("b")])
            .unwrap();

        assert!(tmp.path().join("archive/gitterHQ/sandbox.json").exists());
        assert!(tmp.path().join("archive/gitterHQ/sandbox_docs.json").exists());

        let reloaded = store.load("gitterHQ/sandbox").unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded.newest_id(), Some("b"));
        assert_eq!(store.load_ledger("gitterHQ/sandbox").unwrap().len(), 2);
    }

    #[test]
    fn test_missing_room_loads_empty() {
        let tmp = tempdir().unwrap();
        let store = ArchiveStore::new(tmp.path());
        assert!(store.load("gitterHQ/nowhere").unwrap().is_empty());
        assert!(store.load_ledger("gitterHQ/nowhere").unwrap().is_empty());
    }

    #[test]
    fn test_save_is_byte_stable() {
        let tmp = tempdir().unwrap();
        let store = ArchiveStore::new(tmp.path());
        let record = ArchiveRecord::from_messages(vec![msg("a")]).unwrap();

        store.save("sandbox", &record, &[doc("a")]).unwrap();
        let first = fs::read(tmp.path().join("archive/sandbox.json")).unwrap();
        store.save("sandbox", &record, &[doc("a")]).unwrap();
        let second = fs::read(tmp.path().join("archive/sandbox.json")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_list_rooms_skips_ledger_files() {
        let tmp = tempdir().unwrap();
        let store = ArchiveStore::new(tmp.path());
        store
            .save("gitterHQ/sandbox", &ArchiveRecord::default(), &[])
            .unwrap();
        store.save("lonely", &ArchiveRecord::default(), &[]).unwrap();

        let rooms = store.list_rooms().unwrap();
        assert_eq!(rooms, vec!["gitterHQ/sandbox", "lonely"]);
    }
}
