//! Directional, cursor-based pagination over a room's message history.
//!
//! A room with no archive is walked Backward from the newest message toward
//! history; a room with an archive is walked Forward from its newest
//! archived id. The pager advances its cursor from the edge of each page
//! (the first message when walking Backward, the last when walking Forward)
//! and finishes on the first empty page.

use tracing::warn;

use crate::client::{MessageApi, TransportError};
use crate::model::WireMessage;
use gitterlog_archive::{Direction, Message};

pub struct MessagePager {
    room_id: String,
    direction: Direction,
    cursor: Option<String>,
    page_size: usize,
    first_fetch: bool,
    done: bool,
}

impl MessagePager {
    /// Walk history from the newest message backward. Used when the room
    /// has no archive yet; the first page is fetched without a cursor.
    pub fn backward(room_id: &str, page_size: usize) -> Self {
        Self {
            room_id: room_id.to_string(),
            direction: Direction::Backward,
            cursor: None,
            page_size,
            first_fetch: true,
            done: false,
        }
    }

    /// Continue forward from the newest archived message. The first fetch
    /// is cache-busted: a cached "no new messages" page would otherwise
    /// stall the archive.
    pub fn forward(room_id: &str, newest_id: &str, page_size: usize) -> Self {
        Self {
            room_id: room_id.to_string(),
            direction: Direction::Forward,
            cursor: Some(newest_id.to_string()),
            page_size,
            first_fetch: true,
            done: false,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Fetch and decode the next page, or `None` once the walk is done.
    ///
    /// Wire entries missing a required field are warned about and dropped
    /// here, before any merge, so they are invisible to both the archive
    /// and the index.
    pub async fn next_page(
        &mut self,
        api: &dyn MessageApi,
    ) -> Result<Option<Vec<Message>>, TransportError> {
        if self.done {
            return Ok(None);
        }

        let path = self.page_path();
        let fresh = self.first_fetch && self.direction == Direction::Forward;
        let body = if fresh {
            api.get_fresh(&path).await?
        } else {
            api.get(&path).await?
        };
        self.first_fetch = false;

        let wire: Vec<WireMessage> =
            serde_json::from_value(body).map_err(|source| TransportError::Payload {
                path: path.clone(),
                source,
            })?;
        if wire.is_empty() {
            self.done = true;
            return Ok(None);
        }

        // Cursor advance comes from the wire page so a dropped edge entry
        // cannot stall the walk.
        let edge = match self.direction {
            Direction::Backward => wire.first(),
            Direction::Forward => wire.last(),
        };
        self.cursor = edge.map(|m| m.id.clone());

        let mut page = Vec::with_capacity(wire.len());
        for raw in wire {
            let id = raw.id.clone();
            match raw.into_message() {
                Ok(message) => page.push(message),
                Err(reason) => {
                    warn!(message_id = %id, reason, "dropping malformed message");
                }
            }
        }
        Ok(Some(page))
    }

    fn page_path(&self) -> String {
        let mut path = format!(
            "/rooms/{}/chatMessages?limit={}",
            self.room_id, self.page_size
        );
        if let Some(cursor) = &self.cursor {
            let key = match self.direction {
                Direction::Backward => "beforeId",
                Direction::Forward => "afterId",
            };
            path.push_str(&format!("&{key}={cursor}"));
        }
        path
    }
}
