//! NewsAPI client.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use thiserror::Error;

use crate::cache_key::Endpoint;
use crate::custom_date::parse_published;
use crate::model::{article_id, Article, Category, UserContext};

pub const DEFAULT_BASE_URL: &str = "https://newsapi.org/v2";
pub const DEFAULT_PAGE_SIZE: u16 = 20;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to news api failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed news api response: {0}")]
    Json(#[from] serde_json::Error),

    #[error("news api returned HTTP {0}")]
    Status(u16),

    #[error("news api error {code}: {message}")]
    Api { code: String, message: String },

    #[error("search query must not be empty")]
    MissingQuery,
}

#[async_trait]
pub trait NewsApi: Send + Sync {
    async fn fetch_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, FetchError>;

    async fn fetch_sources(
        &self,
        category: Option<Category>,
        user: Option<&UserContext>,
    ) -> Result<Vec<String>, FetchError>;
}

/// Upstream request for one page of articles.
#[derive(Debug, Clone, PartialEq)]
pub struct ArticleQuery {
    pub endpoint: Endpoint,
    pub category: Option<Category>,
    pub query: Option<String>,
    pub page: u32,
    pub page_size: u16,
    pub language: String,
    pub country: Option<String>,
}

impl ArticleQuery {
    pub fn top_headlines(
        category: Option<Category>,
        query: Option<&str>,
        page: u32,
        page_size: u16,
        user: Option<&UserContext>,
    ) -> Self {
        let prefs = user.cloned().unwrap_or_default();
        Self {
            endpoint: Endpoint::TopHeadlines,
            category,
            query: query.map(str::to_string),
            page,
            page_size,
            language: prefs.language,
            country: Some(prefs.country),
        }
    }

    pub fn everything(
        query: &str,
        category: Option<Category>,
        page: u32,
        page_size: u16,
        user: Option<&UserContext>,
    ) -> Self {
        let prefs = user.cloned().unwrap_or_default();
        Self {
            endpoint: Endpoint::Everything,
            category,
            query: Some(query.to_string()),
            page,
            page_size,
            language: prefs.language,
            country: None,
        }
    }

    /// Query string parameters sent upstream.
    pub fn params(&self) -> Vec<(&'static str, String)> {
        let query = self
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty());

        let mut params = Vec::new();
        match self.endpoint {
            Endpoint::TopHeadlines => {
                params.push(("page", self.page.to_string()));
                params.push(("pageSize", self.page_size.to_string()));
                params.push(("language", self.language.clone()));
                if let Some(country) = &self.country {
                    params.push(("country", country.clone()));
                }
                if let Some(category) = self.category.filter(|c| *c != Category::General) {
                    params.push(("category", category.api_name().to_string()));
                }
                if let Some(q) = query {
                    params.push(("q", q.to_string()));
                }
            }
            Endpoint::Everything => {
                params.push(("q", query.unwrap_or_default().to_string()));
                params.push(("page", self.page.to_string()));
                params.push(("pageSize", self.page_size.to_string()));
                params.push(("sortBy", "relevancy".to_string()));
                params.push(("language", self.language.clone()));
            }
        }
        params
    }
}

fn build_user_agent() -> HeaderMap {
    let custom_user_agent = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/133.0.0.0 Safari/537.36";

    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(custom_user_agent));
    headers
}

pub struct NewsApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl NewsApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .default_headers(build_user_agent())
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get(&self, path: &str, params: &[(&'static str, String)]) -> Result<String, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        debug!("GET {} {:?}", url, params);

        let response = self
            .client
            .get(&url)
            .header("X-Api-Key", &self.api_key)
            .query(params)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // NewsAPI explains most failures in a JSON body
            return Err(match serde_json::from_str::<ApiResponse>(&body) {
                Ok(parsed) => parsed.into_error(),
                Err(_) => FetchError::Status(status.as_u16()),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl NewsApi for NewsApiClient {
    async fn fetch_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, FetchError> {
        let body = self.get(query.endpoint.path(), &query.params()).await?;
        parse_articles(&body, query.category)
    }

    async fn fetch_sources(
        &self,
        category: Option<Category>,
        user: Option<&UserContext>,
    ) -> Result<Vec<String>, FetchError> {
        let mut params = Vec::new();
        if let Some(category) = category.filter(|c| *c != Category::General) {
            params.push(("category", category.api_name().to_string()));
        }
        match user {
            Some(user) => {
                params.push(("language", user.language.clone()));
                params.push(("country", user.country.clone()));
            }
            None => params.push(("language", UserContext::default().language)),
        }

        let body = self.get("sources", &params).await?;
        parse_sources(&body)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    status: String,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<RawArticle>,
    #[serde(default)]
    sources: Vec<RawSource>,
}

impl ApiResponse {
    fn into_error(self) -> FetchError {
        FetchError::Api {
            code: self.code.unwrap_or_else(|| "unknown".into()),
            message: self.message.unwrap_or_default(),
        }
    }

    fn ensure_ok(self) -> Result<Self, FetchError> {
        if self.status == "error" {
            Err(self.into_error())
        } else {
            Ok(self)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawArticle {
    source: Option<RawSource>,
    author: Option<String>,
    title: Option<String>,
    description: Option<String>,
    url: Option<String>,
    url_to_image: Option<String>,
    published_at: Option<String>,
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    id: Option<String>,
    name: Option<String>,
}

impl RawArticle {
    fn into_article(self, category: Option<Category>) -> Article {
        let url = self.url.unwrap_or_default();
        let title = self.title.unwrap_or_default();

        let published_at = self
            .published_at
            .as_deref()
            .and_then(|raw| match parse_published(raw) {
                Ok(dt) => Some(dt),
                Err(e) => {
                    warn!("Failed to parse date {:?}: {}", raw, e);
                    None
                }
            });

        Article {
            id: article_id(&url, &title),
            description: self.description.unwrap_or_default(),
            content: self.content.unwrap_or_default(),
            author: self.author.unwrap_or_default(),
            image_url: self.url_to_image.unwrap_or_default(),
            published_at,
            source: self.source.and_then(|s| s.name).unwrap_or_default(),
            category,
            url,
            title,
        }
    }
}

/// Parses an `/top-headlines` or `/everything` body. Every article is tagged
/// with the category it was requested under.
pub fn parse_articles(body: &str, category: Option<Category>) -> Result<Vec<Article>, FetchError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    let response = response.ensure_ok()?;

    Ok(response
        .articles
        .into_iter()
        .map(|raw| raw.into_article(category))
        .collect())
}

pub fn parse_sources(body: &str) -> Result<Vec<String>, FetchError> {
    let response: ApiResponse = serde_json::from_str(body)?;
    let response = response.ensure_ok()?;

    Ok(response.sources.into_iter().filter_map(|s| s.id).collect())
}
