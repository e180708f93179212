use serde::{Deserialize, Serialize};

pub mod api;
pub mod auth;
pub mod hub;

pub const WATCH_URL_BASE: &str = "https://www.youtube.com/watch?v=";

/// Ids extracted from an inbound push payload. Never persisted, only drives
/// resolution and state application.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "web_api", derive(utoipa::ToSchema))]
pub struct Notification {
    pub video_id: Option<String>,
    pub channel_id: Option<String>,
}

/// Pulls the video and channel ids out of an Atom feed payload.
///
/// The hub's payloads are small and well-known, so this matches tags by string
/// scanning instead of a full XML parser. Missing or empty elements simply
/// leave the id unset.
pub fn parse_notification(xml: &str) -> Notification {
    Notification {
        video_id: extract_tag(xml, "yt:videoId").or_else(|| video_id_from_entry_id(xml)),
        channel_id: extract_tag(xml, "yt:channelId"),
    }
}

fn extract_tag(xml: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");

    let start = xml.find(&open)? + open.len();
    let end = xml[start..].find(&close)? + start;

    let value = xml[start..end].trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_owned())
    }
}

/// Older payload shape: the entry `<id>` element reads `yt:video:<ID>`. The
/// feed-level `<id>` is `yt:channel:<ID>` and has to be skipped over.
fn video_id_from_entry_id(xml: &str) -> Option<String> {
    let mut rest = xml;
    while let Some(start) = rest.find("<id>") {
        let after = &rest[start + "<id>".len()..];
        let end = after.find("</id>")?;
        if let Some(id) = after[..end].trim().strip_prefix("yt:video:") {
            if !id.is_empty() {
                return Some(id.to_owned());
            }
        }
        rest = &after[end..];
    }
    None
}

/// Channel ids handed out by YouTube are 24 characters starting with `UC`.
pub fn is_channel_id(value: &str) -> bool {
    value.len() == 24 && value.starts_with("UC")
}

/// Last meaningful path segment of a channel page URL, the identifier the
/// resolver matches on. Covers `/channel/<id>`, `/@handle`, `/c/<name>`,
/// `/user/<name>` and bare vanity paths; query strings, fragments and
/// trailing slashes are ignored. Returns `None` when the URL has no path.
pub fn channel_ident_from_url(url: &str) -> Option<&str> {
    let without_scheme = match url.split_once("://") {
        Some((_, rest)) => rest,
        None => url,
    };
    let end = without_scheme
        .find(['?', '#'])
        .unwrap_or(without_scheme.len());
    let (_, path) = without_scheme[..end].split_once('/')?;

    path.rsplit('/').find(|segment| !segment.is_empty())
}
