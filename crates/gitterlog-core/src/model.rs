//! Room listing and wire-format message types for the remote API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use gitterlog_archive::{Message, MessageAuthor, UrlRef};
use gitterlog_search::RoomContext;

/// A chat room as listed by the remote API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: String,
    /// Display name; the last `/` separates an optional group prefix.
    pub name: String,
    #[serde(default)]
    pub uri: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub one_to_one: bool,
    #[serde(default)]
    pub security: Option<String>,
}

impl Room {
    /// One-to-one and private conversations are never archived.
    pub fn is_archivable(&self) -> bool {
        !self.one_to_one && self.security.as_deref() != Some("PRIVATE")
    }

    /// Filesystem-safe identifier the archive files are addressed by,
    /// falling back to the room URL when the API omits the uri.
    pub fn archive_uri(&self) -> String {
        if let Some(uri) = &self.uri {
            return uri.clone();
        }
        self.url
            .as_deref()
            .unwrap_or(self.name.as_str())
            .trim_start_matches('/')
            .to_string()
    }

    pub fn context(&self) -> RoomContext {
        RoomContext::from_display_name(&self.name)
    }
}

/// A message as the API delivers it. Fields the archive requires are
/// optional here; entries missing one are dropped at decode time, before
/// merging, so the archive and the index always see the same set.
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub id: String,
    #[serde(default)]
    pub sent: Option<DateTime<Utc>>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default, rename = "fromUser")]
    pub from_user: Option<MessageAuthor>,
    #[serde(default)]
    pub urls: Option<Vec<UrlRef>>,
}

impl WireMessage {
    /// Promote to an archivable message, naming the missing field on
    /// failure.
    pub fn into_message(self) -> Result<Message, &'static str> {
        let sent = self.sent.ok_or("missing sent timestamp")?;
        let author = self.from_user.ok_or("missing author")?;
        Ok(Message {
            id: self.id,
            sent,
            text: self.text.unwrap_or_default(),
            author,
            urls: self.urls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn room(value: serde_json::Value) -> Room {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_one_to_one_rooms_are_not_archivable() {
        let room = room(json!({
            "id": "r1", "name": "alice", "oneToOne": true
        }));
        assert!(!room.is_archivable());
    }

    #[test]
    fn test_private_rooms_are_not_archivable() {
        let room = room(json!({
            "id": "r1", "name": "gitterHQ/secret",
            "oneToOne": false, "security": "PRIVATE"
        }));
        assert!(!room.is_archivable());
    }

    #[test]
    fn test_public_group_rooms_are_archivable() {
        let room = room(json!({
            "id": "r1", "name": "gitterHQ/sandbox",
            "oneToOne": false, "security": "PUBLIC", "uri": "gitterHQ/sandbox"
        }));
        assert!(room.is_archivable());
        assert_eq!(room.archive_uri(), "gitterHQ/sandbox");
    }

    #[test]
    fn test_archive_uri_falls_back_to_url() {
        let room = room(json!({
            "id": "r1", "name": "gitterHQ/sandbox", "url": "/gitterHQ/sandbox"
        }));
        assert_eq!(room.archive_uri(), "gitterHQ/sandbox");
    }

    #[test]
    fn test_wire_message_without_author_is_rejected() {
        let wire: WireMessage = serde_json::from_value(json!({
            "id": "m1", "sent": "2024-01-01T12:00:00.000Z", "text": "hi"
        }))
        .unwrap();
        assert_eq!(wire.into_message().unwrap_err(), "missing author");
    }

    #[test]
    fn test_wire_message_promotes_with_defaults() {
        let wire: WireMessage = serde_json::from_value(json!({
            "id": "m1",
            "sent": "2024-01-01T12:00:00.000Z",
            "fromUser": {"username": "alice", "displayName": "Alice"}
        }))
        .unwrap();
        let message = wire.into_message().unwrap();
        assert_eq!(message.text, "");
        assert!(message.urls.is_none());
    }
}
