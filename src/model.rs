use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Business,
    Entertainment,
    General,
    Health,
    Science,
    Sports,
    Technology,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Business,
        Category::Entertainment,
        Category::General,
        Category::Health,
        Category::Science,
        Category::Sports,
        Category::Technology,
    ];

    /// Name used by NewsAPI and inside cache keys.
    pub fn api_name(&self) -> &'static str {
        match self {
            Category::Business => "business",
            Category::Entertainment => "entertainment",
            Category::General => "general",
            Category::Health => "health",
            Category::Science => "science",
            Category::Sports => "sports",
            Category::Technology => "technology",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Category::Business => "Business",
            Category::Entertainment => "Entertainment",
            Category::General => "General",
            Category::Health => "Health",
            Category::Science => "Science",
            Category::Sports => "Sports",
            Category::Technology => "Technology",
        }
    }

    /// Unknown names fall back to `General`.
    pub fn from_api_name(name: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|c| c.api_name() == name)
            .unwrap_or(Category::General)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub description: String,
    pub content: String,
    pub author: String,
    pub url: String,
    pub image_url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub source: String,
    pub category: Option<Category>,
}

/// Stable article identifier: rolling 31-multiplier hash of `url + title`
/// over UTF-16 code units, printed as a signed 32-bit number.
pub fn article_id(url: &str, title: &str) -> String {
    let hash = url
        .encode_utf16()
        .chain(title.encode_utf16())
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32));
    hash.to_string()
}

/// Profile preferences that take part in cache key derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserContext {
    pub language: String,
    pub country: String,
}

fn is_two_letter_code(code: &str) -> bool {
    code.len() == 2 && code.bytes().all(|b| b.is_ascii_lowercase())
}

impl UserContext {
    /// Both fields must be two lowercase ASCII letters (ISO 639-1 / 3166-1).
    pub fn is_valid(&self) -> bool {
        is_two_letter_code(&self.language) && is_two_letter_code(&self.country)
    }
}

impl Default for UserContext {
    fn default() -> Self {
        Self {
            language: "en".into(),
            country: "us".into(),
        }
    }
}
