//! Incremental synchronization engine for Gitter room archives.
//!
//! Pulls message history through the rate-limited API client, merges it
//! into per-room archives, and feeds newly seen messages to the search
//! indexing pipeline while holding the archive and index to the same count.

pub mod client;
pub mod config;
pub mod model;
pub mod pagination;
pub mod sync;

pub use client::{GitterClient, MessageApi, TransportError};
pub use config::Config;
pub use model::Room;
pub use pagination::MessagePager;
pub use sync::{RoomOutcome, SkipReason, SyncError, SyncOrchestrator, SyncReport, SyncSummary};

pub use gitterlog_archive::{
    ArchiveError, ArchiveRecord, ArchiveStore, Direction, IndexedDocument, Message,
    MessageAuthor, UrlRef,
};
pub use gitterlog_search::{
    project, EsBackend, IndexError, IndexingPipeline, RoomContext, SearchBackend,
};
