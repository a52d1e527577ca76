//! Projection and indexing of archived messages into the search backend.

use thiserror::Error;

mod backend;
mod pipeline;
mod project;

pub use backend::{EsBackend, SearchBackend};
pub use pipeline::{chunked, IndexingPipeline};
pub use project::{project, RoomContext, NO_GROUP, SERVICE_ROOT};

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search backend request failed: {0}")]
    Backend(#[from] reqwest::Error),

    #[error("search backend returned a malformed response: {0}")]
    MalformedResponse(String),

    /// The backend acknowledged fewer documents than were submitted. Fatal
    /// to the whole run: letting it pass would leave the archive and the
    /// index silently diverged.
    #[error("backend acknowledged {acked} of {submitted} documents")]
    CountMismatch { submitted: usize, acked: usize },

    /// Archive and ledger disagree on how many messages a room holds.
    #[error("room {room}: archive holds {archived} messages but ledger holds {indexed}")]
    LedgerDiverged {
        room: String,
        archived: usize,
        indexed: usize,
    },
}
