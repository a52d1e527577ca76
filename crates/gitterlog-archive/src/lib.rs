//! Per-room message archives and the indexed-document ledger.
//!
//! Each room owns two files under the archive root: `<uri>.json` holding the
//! full ordered message history, and `<uri>_docs.json` holding the documents
//! that have been handed to the search backend. The two files are written
//! together after a room finishes syncing, so a crash mid-room leaves the
//! previous consistent state on disk.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod store;

pub use store::ArchiveStore;

/// A single archived chat message. Immutable once archived.
///
/// Field names on disk match the remote API payload, so archives written by
/// earlier tooling load unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub sent: DateTime<Utc>,
    pub text: String,
    #[serde(rename = "fromUser")]
    pub author: MessageAuthor,
    /// URL references embedded in the message body. Absence is a valid
    /// state, not a missing-key fault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<UrlRef>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAuthor {
    pub username: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UrlRef {
    pub url: String,
}

/// Projection of a [`Message`] persisted alongside the archive as the
/// durable record of what has been submitted to the search backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    pub group_name: String,
    pub room_name: String,
    pub display_name: String,
    pub username: String,
    pub message: String,
    pub sent: DateTime<Utc>,
    pub permalink: String,
}

/// Which way a page of messages was fetched relative to the archive.
///
/// Backward pages reach into history before the oldest archived message;
/// Forward pages continue past the newest one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Backward,
    Forward,
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The remote returned an id the archive already holds. This is a
    /// pagination-protocol defect and is never silently deduplicated.
    #[error("duplicate message id {id} while merging page")]
    DuplicateId { id: String },

    #[error("failed to access {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed archive file {path}: {source}")]
    Malformed {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// The ordered oldest-to-newest message history of one room.
///
/// Invariants: no id appears twice, and merges preserve the internal order
/// of every page they fold in.
#[derive(Debug, Default)]
pub struct ArchiveRecord {
    messages: Vec<Message>,
    ids: HashSet<String>,
}

impl ArchiveRecord {
    /// Build a record from an already-ordered message sequence, rejecting
    /// duplicate ids.
    pub fn from_messages(messages: Vec<Message>) -> Result<Self, ArchiveError> {
        let mut ids = HashSet::with_capacity(messages.len());
        for message in &messages {
            if !ids.insert(message.id.clone()) {
                return Err(ArchiveError::DuplicateId {
                    id: message.id.clone(),
                });
            }
        }
        Ok(Self { messages, ids })
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Id of the newest archived message, used as the Forward cursor.
    pub fn newest_id(&self) -> Option<&str> {
        self.messages.last().map(|m| m.id.as_str())
    }

    /// Fold a fetched page into the record.
    ///
    /// Backward pages are prepended and Forward pages appended, both
    /// preserving the page's own order, so the record stays oldest-first.
    pub fn merge(&mut self, page: &[Message], direction: Direction) -> Result<(), ArchiveError> {
        for message in page {
            if !self.ids.insert(message.id.clone()) {
                return Err(ArchiveError::DuplicateId {
                    id: message.id.clone(),
                });
            }
        }
        match direction {
            Direction::Backward => {
                self.messages.splice(0..0, page.iter().cloned());
            }
            Direction::Forward => {
                self.messages.extend(page.iter().cloned());
            }
        }
        Ok(())
    }
}
