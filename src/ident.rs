//! Extracts `(kind, id)` items from YouTube URLs and bare identifiers.

use crate::engine::{Item, ItemKind};
use url::Url;

const BASE: &str = "https://www.youtube.com";
const PLAYLIST_PREFIXES: [&str; 6] = ["PL", "UU", "OL", "FL", "RD", "LL"];

fn is_id_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}

fn is_video_id(s: &str) -> bool {
    s.len() == 11 && s.chars().all(is_id_char)
}

fn is_channel_id(s: &str) -> bool {
    s.len() == 24 && s.starts_with("UC") && s.chars().all(is_id_char)
}

fn is_playlist_id(s: &str) -> bool {
    s.len() > 11
        && PLAYLIST_PREFIXES.iter().any(|p| s.starts_with(p))
        && s.chars().all(is_id_char)
}

fn is_youtube_host(host: &str) -> bool {
    host == "youtu.be"
        || host == "youtube.com"
        || host.ends_with(".youtube.com")
        || host.ends_with("youtube-nocookie.com")
}

/// Accepts absolute URLs, scheme-less YouTube URLs, site-relative paths
/// (`/watch?v=...`) and bare ids / handles.
pub fn parse(input: &str) -> Option<Item> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if input.contains('/') || input.contains('?') {
        parse_url(input)
    } else {
        parse_bare(input)
    }
}

fn parse_bare(input: &str) -> Option<Item> {
    if let Some(handle) = input.strip_prefix('@') {
        return (!handle.is_empty() && handle.chars().all(|c| is_id_char(c) || c == '.'))
            .then(|| Item::new(ItemKind::Handle, input));
    }
    if is_video_id(input) {
        return Some(Item::new(ItemKind::Video, input));
    }
    if is_channel_id(input) {
        return Some(Item::new(ItemKind::Channel, input));
    }
    if is_playlist_id(input) {
        return Some(Item::new(ItemKind::Playlist, input));
    }
    None
}

fn parse_url(input: &str) -> Option<Item> {
    let absolute = if input.contains("://") {
        input.to_string()
    } else if input.starts_with('/') {
        format!("{}{}", BASE, input)
    } else {
        format!("https://{}", input)
    };
    let url = Url::parse(&absolute).ok()?;
    let host = url.host_str()?;
    if !is_youtube_host(host) {
        return None;
    }

    let segments: Vec<&str> = url
        .path_segments()
        .map(|s| s.filter(|seg| !seg.is_empty()).collect())
        .unwrap_or_default();
    let query = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .filter(|v| !v.is_empty())
    };

    if host == "youtu.be" {
        return segments
            .first()
            .filter(|id| is_video_id(id))
            .map(|id| Item::new(ItemKind::Video, *id));
    }

    if let Some(v) = query("v") {
        return Some(Item::new(ItemKind::Video, v));
    }

    match segments.as_slice() {
        ["shorts" | "embed" | "live", id, ..] => {
            return Some(Item::new(ItemKind::Video, *id));
        }
        ["channel", id, ..] => {
            return Some(Item::new(ItemKind::Channel, *id));
        }
        _ => {}
    }

    if let Some(list) = query("list") {
        return Some(Item::new(ItemKind::Playlist, list));
    }

    segments
        .first()
        .filter(|seg| seg.starts_with('@') && seg.len() > 1)
        .map(|seg| Item::new(ItemKind::Handle, *seg))
}
