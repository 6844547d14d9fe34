//! Cache key derivation.
//!
//! Field order is fixed: endpoint, category, query, page, language, country.
//! Language and country only appear when a user context is present, and
//! country only for top headlines.

use std::fmt;

use crate::model::{Category, UserContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    TopHeadlines,
    Everything,
}

impl Endpoint {
    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::TopHeadlines => "top-headlines",
            Endpoint::Everything => "everything",
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Trimmed query text, or `None` when the query is missing or blank.
pub fn normalize_query(query: Option<&str>) -> Option<&str> {
    query.map(str::trim).filter(|q| !q.is_empty())
}

pub fn cache_key(
    endpoint: Endpoint,
    category: Option<Category>,
    query: Option<&str>,
    page: u32,
    user: Option<&UserContext>,
) -> String {
    let mut key = String::from(endpoint.path());

    if let Some(category) = category {
        key.push_str("_cat-");
        key.push_str(category.api_name());
    }

    if let Some(query) = normalize_query(query) {
        key.push_str("_q-");
        key.push_str(query);
    }

    key.push_str("_p-");
    key.push_str(&page.to_string());

    if let Some(user) = user {
        key.push_str("_lang-");
        key.push_str(&user.language);
        if endpoint == Endpoint::TopHeadlines {
            key.push_str("_country-");
            key.push_str(&user.country);
        }
    }

    key
}
