//! YouTube link helpers.

use std::sync::LazyLock;

use regex::Regex;

const ID_LEN: usize = 11;

/// The last marker wins because of the greedy prefix; `\w` is ASCII only.
static VIDEO_ID_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^.*(youtu.be/|v/|u/(?-u:\w)/|embed/|watch\?v=|&v=)([^#&?]*)")
        .expect("Invalid video id regex")
});

static YOUTUBE_LINK_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"https?://(?:[A-Za-z0-9-]+\.)*(?:youtube\.com|youtu\.be)(?:/[^\s()<>\[\]"]*)?"#)
        .expect("Invalid YouTube link regex")
});

pub fn is_youtube_url(url: &str) -> bool {
    url.contains("youtube.com") || url.contains("youtu.be")
}

/// Extracts the 11 character video id from the usual YouTube link shapes
/// (`youtu.be/ID`, `watch?v=ID`, `&v=ID`, `embed/ID`, `v/ID`, `u/x/ID`).
pub fn video_id(url: &str) -> Option<&str> {
    let id = VIDEO_ID_REGEX.captures(url)?.get(2)?.as_str();
    (id.chars().count() == ID_LEN).then_some(id)
}

pub fn watch_url(id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", id)
}

/// First YouTube link found in free text, trimmed of trailing punctuation.
pub fn find_link(text: &str) -> Option<&str> {
    YOUTUBE_LINK_REGEX
        .find(text)
        .map(|m| m.as_str().trim_end_matches(['.', ',', ';', ':', '!', '\'']))
}
