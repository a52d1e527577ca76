//! The per-run orchestrator: rooms in, archives and index documents out.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{MessageApi, TransportError};
use crate::model::Room;
use crate::pagination::MessagePager;
use gitterlog_archive::{ArchiveError, ArchiveStore, IndexedDocument, Message};
use gitterlog_search::{project, IndexError, IndexingPipeline};

/// Failure that aborts the whole run. Everything else is room-scoped and
/// reported through [`RoomOutcome`].
#[derive(Debug, Error)]
pub enum SyncError {
    /// The room listing could not be fetched; nothing was processed.
    #[error("failed to list rooms: {0}")]
    RoomListing(#[source] TransportError),

    /// The archive and the index would diverge if the run continued.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// What happened to one room during a run.
#[derive(Debug)]
pub enum RoomOutcome {
    Synced {
        room: String,
        new_messages: usize,
        total_messages: usize,
        indexed: usize,
    },
    Skipped {
        room: String,
        reason: SkipReason,
    },
}

#[derive(Debug)]
pub enum SkipReason {
    Transport(TransportError),
    Archive(ArchiveError),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Transport(e) => write!(f, "{e}"),
            SkipReason::Archive(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct SyncSummary {
    pub rooms_scanned: usize,
    pub rooms_synced: usize,
    pub rooms_skipped: usize,
    pub messages_archived: usize,
    pub documents_indexed: usize,
}

#[derive(Debug)]
pub struct SyncReport {
    pub summary: SyncSummary,
    pub outcomes: Vec<RoomOutcome>,
}

/// Drives a full run: list rooms, filter for eligibility, then per room
/// paginate, merge, index, verify, and persist.
pub struct SyncOrchestrator<'a> {
    api: &'a dyn MessageApi,
    store: &'a ArchiveStore,
    /// `None` disables backend submission; projections still land in the
    /// ledger so the count invariant stays checkable.
    pipeline: Option<&'a IndexingPipeline<'a>>,
    page_size: usize,
}

impl<'a> SyncOrchestrator<'a> {
    pub fn new(
        api: &'a dyn MessageApi,
        store: &'a ArchiveStore,
        pipeline: Option<&'a IndexingPipeline<'a>>,
        page_size: usize,
    ) -> Self {
        Self {
            api,
            store,
            pipeline,
            page_size,
        }
    }

    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        if let Some(pipeline) = self.pipeline {
            pipeline.ensure_index().await?;
        }

        let rooms = self.list_rooms().await.map_err(SyncError::RoomListing)?;
        info!(rooms = rooms.len(), "listed rooms");

        let mut summary = SyncSummary::default();
        let mut outcomes = Vec::new();
        for room in &rooms {
            if !room.is_archivable() {
                debug!(room = %room.name, "not archivable, skipping");
                continue;
            }
            summary.rooms_scanned += 1;

            let outcome = self.sync_room(room).await?;
            match &outcome {
                RoomOutcome::Synced {
                    new_messages,
                    indexed,
                    ..
                } => {
                    summary.rooms_synced += 1;
                    summary.messages_archived += new_messages;
                    summary.documents_indexed += indexed;
                }
                RoomOutcome::Skipped { room, reason } => {
                    warn!(room = %room, %reason, "room skipped");
                    summary.rooms_skipped += 1;
                }
            }
            outcomes.push(outcome);
        }

        info!(
            rooms = summary.rooms_scanned,
            new_messages = summary.messages_archived,
            indexed = summary.documents_indexed,
            "run complete"
        );
        Ok(SyncReport { summary, outcomes })
    }

    async fn list_rooms(&self) -> Result<Vec<Room>, TransportError> {
        // Always cache-busted: a replayed room list would hide new rooms.
        let body = self.api.get_fresh("/rooms").await?;
        serde_json::from_value(body).map_err(|source| TransportError::Payload {
            path: "/rooms".to_string(),
            source,
        })
    }

    /// Sync one room to completion. Room-scoped failures come back as a
    /// [`RoomOutcome::Skipped`] value; only invariant violations escape as
    /// `Err`, aborting the run before the next room starts.
    async fn sync_room(&self, room: &Room) -> Result<RoomOutcome, SyncError> {
        let uri = room.archive_uri();
        let ctx = room.context();
        info!(room = %room.name, "processing room");

        let mut record = match self.store.load(&uri) {
            Ok(record) => record,
            Err(e) => return Ok(skipped(room, SkipReason::Archive(e))),
        };
        let mut ledger = match self.store.load_ledger(&uri) {
            Ok(ledger) => ledger,
            Err(e) => return Ok(skipped(room, SkipReason::Archive(e))),
        };

        let mut pager = match record.newest_id() {
            Some(newest) => MessagePager::forward(&room.id, newest, self.page_size),
            None => MessagePager::backward(&room.id, self.page_size),
        };

        let mut new_messages: Vec<Message> = Vec::new();
        loop {
            let page = match pager.next_page(self.api).await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                // Nothing was persisted; rerunning the process is the
                // retry mechanism.
                Err(e) => return Ok(skipped(room, SkipReason::Transport(e))),
            };
            if let Err(e) = record.merge(&page, pager.direction()) {
                return Ok(skipped(room, SkipReason::Archive(e)));
            }
            new_messages.extend(page);
            debug!(room = %room.name, total = record.len(), "merged page");
        }

        let docs: Vec<IndexedDocument> =
            new_messages.iter().map(|m| project(m, &ctx)).collect();
        let mut indexed = 0;
        if let Some(pipeline) = self.pipeline {
            indexed = pipeline.index(&docs).await?;
        }
        ledger.extend(docs);

        if record.len() != ledger.len() {
            return Err(SyncError::Index(IndexError::LedgerDiverged {
                room: room.name.clone(),
                archived: record.len(),
                indexed: ledger.len(),
            }));
        }

        if let Err(e) = self.store.save(&uri, &record, &ledger) {
            return Ok(skipped(room, SkipReason::Archive(e)));
        }

        info!(
            room = %room.name,
            new = new_messages.len(),
            total = record.len(),
            "room synced"
        );
        Ok(RoomOutcome::Synced {
            room: room.name.clone(),
            new_messages: new_messages.len(),
            total_messages: record.len(),
            indexed,
        })
    }
}

fn skipped(room: &Room, reason: SkipReason) -> RoomOutcome {
    RoomOutcome::Skipped {
        room: room.name.clone(),
        reason,
    }
}
