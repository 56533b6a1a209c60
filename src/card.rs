//! Telegram rendering of the meal card, in MarkdownV2.

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup};
use teloxide::utils::markdown::{bold, escape, italic};

use crate::recipe::RandomRecipe;
use crate::youtube;

pub const GET_MEAL: &str = "get_meal";
/// Telegram rejects longer text messages.
pub const MESSAGE_LIMIT: usize = 4096;

pub const GREETING: &str =
    "*Are you feeling hungry?*\nGet a random meal now by clicking the button below";
pub const LOADING: &str = "Finding a delicious meal for you...";
pub const STILL_PREPARING: &str = "Still preparing your meal...";
pub const ERROR_BANNER: &str = "Oops! The chef dropped the plate. Please try again.";
pub const ASSETS_LOADING: &str = "Cooking up the image...\nFinding the best video tutorial...";
pub const NO_EMBED: &str =
    "We couldn't embed the video directly, but you can still watch it on YouTube.";

pub fn get_meal_keyboard() -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new([[InlineKeyboardButton::callback("🍽 Get Meal", GET_MEAL)]])
}

pub fn recipe_card(recipe: &RandomRecipe) -> String {
    let mut card = format!("{}\n", bold(&escape(&recipe.name)));
    card.push_str(&format!(
        "{} {}\n{} {}\n",
        bold("Category:"),
        escape(&recipe.category),
        bold("Area:"),
        escape(&recipe.area)
    ));
    let tags = recipe.tags();
    if !tags.is_empty() {
        card.push_str(&format!("{} {}\n", bold("Tags:"), escape(&tags.join(", "))));
    }

    card.push_str(&format!("\n{}\n", bold("Ingredients")));
    for item in &recipe.ingredients {
        if item.measure.trim().is_empty() {
            card.push_str(&format!("• {}\n", escape(&item.ingredient)));
        } else {
            card.push_str(&format!(
                "• {}: {}\n",
                escape(&item.ingredient),
                italic(&escape(&item.measure))
            ));
        }
    }

    card.push_str(&format!("\n{}\n", bold("Instructions")));
    card.push_str(&escape(recipe.instructions.trim()));
    card
}

pub fn photo_caption(recipe: &RandomRecipe) -> String {
    bold(&escape(&recipe.name))
}

pub fn photo_file_name(mime_type: &str) -> String {
    let extension = match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "png",
    };
    format!("dish.{}", extension)
}

/// How the tutorial video is offered.
#[derive(Debug, Clone, PartialEq)]
pub enum VideoSection {
    /// A watch link; Telegram shows it with an inline player preview.
    Embedded { id: String },
    /// Fallback when no embeddable video was found.
    Search { url: reqwest::Url },
}

impl VideoSection {
    pub fn new(recipe: &RandomRecipe, video_id: Option<&str>) -> Self {
        match video_id {
            Some(id) => VideoSection::Embedded { id: id.to_string() },
            None => VideoSection::Search {
                url: recipe.youtube_search_url(),
            },
        }
    }

    pub fn text(&self) -> String {
        match self {
            VideoSection::Embedded { id } => format!(
                "{}\n{}",
                bold("Video Recipe"),
                escape(&youtube::watch_url(id))
            ),
            VideoSection::Search { .. } => {
                format!("{}\n{}", bold("Video Recipe"), escape(NO_EMBED))
            }
        }
    }

    pub fn keyboard(&self) -> InlineKeyboardMarkup {
        let get_meal = InlineKeyboardButton::callback("🍽 Get another meal", GET_MEAL);
        match self {
            VideoSection::Embedded { .. } => InlineKeyboardMarkup::new([[get_meal]]),
            VideoSection::Search { url } => InlineKeyboardMarkup::new([
                vec![InlineKeyboardButton::url("▶️ Watch on YouTube", url.clone())],
                vec![get_meal],
            ]),
        }
    }
}

/// Splits escaped MarkdownV2 text into messages of at most `limit`
/// characters, on line boundaries where possible.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut messages = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.split('\n') {
        let line_len = line.chars().count();
        let needed = if current.is_empty() { line_len } else { line_len + 1 };
        if current_len + needed <= limit {
            if !current.is_empty() {
                current.push('\n');
            }
            current.push_str(line);
            current_len += needed;
            continue;
        }
        if !current.is_empty() {
            messages.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if line_len <= limit {
            current.push_str(line);
            current_len = line_len;
        } else {
            let mut pieces = hard_split(line, limit);
            if let Some(last) = pieces.pop() {
                messages.extend(pieces);
                current_len = last.chars().count();
                current = last;
            }
        }
    }
    if !current.trim().is_empty() {
        messages.push(current);
    }
    messages
}

/// Markers that open and close a MarkdownV2 entity when unescaped.
const ENTITY_MARKERS: [char; 3] = ['*', '_', '~'];

/// Cuts a line into chunks of at most `limit` characters. An escape
/// backslash stays with the character it escapes, and entities open at a
/// cut are closed at the end of the chunk and reopened in the next one.
fn hard_split(line: &str, limit: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut open: Vec<char> = Vec::new();
    let mut piece = String::new();
    let mut len = 0;
    let mut reopened_len = 0;

    let mut chars = line.chars();
    while let Some(c) = chars.next() {
        let mut token = String::from(c);
        if c == '\\' {
            token.extend(chars.next());
        }
        let token_len = token.chars().count();

        let mut open_after = open.clone();
        if ENTITY_MARKERS.contains(&c) {
            match open_after.iter().rposition(|m| *m == c) {
                Some(i) => {
                    open_after.remove(i);
                }
                None => open_after.push(c),
            }
        }

        if len + token_len + open_after.len() > limit && len > reopened_len {
            piece.extend(open.iter().rev());
            pieces.push(std::mem::take(&mut piece));
            piece.extend(open.iter());
            len = open.len();
            reopened_len = len;
        }
        piece.push_str(&token);
        len += token_len;
        open = open_after;
    }
    if len > reopened_len || pieces.is_empty() {
        pieces.push(piece);
    }
    pieces
}
