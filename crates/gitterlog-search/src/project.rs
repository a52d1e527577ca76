//! Pure projection from archived messages to index documents.

use gitterlog_archive::{IndexedDocument, Message, UrlRef};

/// Root of the chat service, used to build deep links back to a room.
pub const SERVICE_ROOT: &str = "https://gitter.im";

/// Sentinel group name for rooms that live outside any group.
pub const NO_GROUP: &str = "None";

/// Room naming context attached to every projected document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomContext {
    pub group_name: String,
    pub room_name: String,
}

impl RoomContext {
    /// Split a display name into `(group, room)` on the last `/`. Rooms
    /// without a group get the [`NO_GROUP`] sentinel.
    pub fn from_display_name(name: &str) -> Self {
        match name.rsplit_once('/') {
            Some((group, room)) => Self {
                group_name: group.to_string(),
                room_name: room.to_string(),
            },
            None => Self {
                group_name: NO_GROUP.to_string(),
                room_name: name.to_string(),
            },
        }
    }

    /// Deep link to one message in this room. The group segment is omitted
    /// for ungrouped rooms.
    pub fn permalink(&self, message_id: &str) -> String {
        if self.group_name == NO_GROUP {
            format!("{SERVICE_ROOT}/{}?at={message_id}", self.room_name)
        } else {
            format!(
                "{SERVICE_ROOT}/{}/{}?at={message_id}",
                self.group_name, self.room_name
            )
        }
    }
}

/// Map a message into its index document: author fields flattened, room
/// context attached, permalink derived from the message id, and embedded
/// URLs rewritten as Markdown links.
pub fn project(message: &Message, room: &RoomContext) -> IndexedDocument {
    IndexedDocument {
        group_name: room.group_name.clone(),
        room_name: room.room_name.clone(),
        display_name: message.author.display_name.clone(),
        username: message.author.username.clone(),
        message: rewrite_embedded_urls(&message.text, message.urls.as_deref()),
        sent: message.sent,
        permalink: room.permalink(&message.id),
    }
}

/// Turn bare occurrences of each embedded URL into Markdown links so the
/// backend renders them clickable. URLs the author already wrapped in
/// Markdown are left alone.
fn rewrite_embedded_urls(text: &str, urls: Option<&[UrlRef]>) -> String {
    let Some(urls) = urls else {
        return text.to_string();
    };
    let mut out = text.to_string();
    for UrlRef { url } in urls {
        if out.contains(&format!("]({url})")) {
            continue;
        }
        out = out.replace(url.as_str(), &format!("[{url}]({url})"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use gitterlog_archive::MessageAuthor;

    fn msg(text: &str, urls: Option<Vec<UrlRef>>) -> Message {
        Message {
            id: "5f1a".to_string(),
            sent: Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
            text: text.to_string(),
            author: MessageAuthor {
                username: "alice".to_string(),
                display_name: "Alice Liddell".to_string(),
            },
            urls,
        }
    }

    #[test]
    fn test_context_splits_on_last_slash() {
        let ctx = RoomContext::from_display_name("gitterHQ/nested/sandbox");
        assert_eq!(ctx.group_name, "gitterHQ/nested");
        assert_eq!(ctx.room_name, "sandbox");
    }

    #[test]
    fn test_ungrouped_room_gets_sentinel() {
        let ctx = RoomContext::from_display_name("sandbox");
        assert_eq!(ctx.group_name, NO_GROUP);
        assert_eq!(ctx.room_name, "sandbox");
    }

    #[test]
    fn test_permalink_includes_group_segment() {
        let ctx = RoomContext::from_display_name("gitterHQ/sandbox");
        assert_eq!(
            ctx.permalink("5f1a"),
            "https://gitter.im/gitterHQ/sandbox?at=5f1a"
        );
    }

    #[test]
    fn test_permalink_omits_sentinel_group() {
        let ctx = RoomContext::from_display_name("sandbox");
        assert_eq!(ctx.permalink("5f1a"), "https://gitter.im/sandbox?at=5f1a");
    }

    #[test]
    fn test_project_flattens_author_and_links_message() {
        let ctx = RoomContext::from_display_name("gitterHQ/sandbox");
        let doc = project(&msg("hello", None), &ctx);
        assert_eq!(doc.username, "alice");
        assert_eq!(doc.display_name, "Alice Liddell");
        assert_eq!(doc.group_name, "gitterHQ");
        assert_eq!(doc.permalink, "https://gitter.im/gitterHQ/sandbox?at=5f1a");
    }

    #[test]
    fn test_embedded_urls_become_markdown_links() {
        let urls = vec![UrlRef {
            url: "https://example.org".to_string(),
        }];
        let ctx = RoomContext::from_display_name("sandbox");
        let doc = project(&msg("see https://example.org please", Some(urls)), &ctx);
        assert_eq!(
            doc.message,
            "see [https://example.org](https://example.org) please"
        );
    }

    #[test]
    fn test_already_linked_urls_left_alone() {
        let urls = vec![UrlRef {
            url: "https://example.org".to_string(),
        }];
        let ctx = RoomContext::from_display_name("sandbox");
        let text = "see [docs](https://example.org)";
        let doc = project(&msg(text, Some(urls)), &ctx);
        assert_eq!(doc.message, text);
    }
}
