use actix_web::{
    delete, get,
    http::{header, Method},
    put, route, web, HttpRequest, HttpResponse, Responder,
};
use clap::Parser;
use log::error;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::SystemTime;
use tokio_rusqlite::Connection;

pub mod cache;
pub mod cache_key;
pub mod custom_date;
pub mod database;
pub mod feed;
pub mod model;
pub mod news;
pub mod newsapi;

use cache::ResponseCache;
use model::{Category, UserContext};
use news::{ArticlePage, NewsService};
use newsapi::{FetchError, NewsApi};

#[derive(Parser, Debug, Clone)]
#[clap(about, version)]
pub struct Args {
    #[clap(short, long, default_value = "127.0.0.1")]
    pub ip: String,

    #[clap(short, long, default_value = "3000")]
    pub port: u16,

    /// Articles requested per upstream page
    #[clap(short, long, default_value = "20")]
    pub limit: u16,

    /// Seconds a cached article list stays valid
    #[clap(short, long, default_value = "900")]
    pub cache_lifetime: u32,

    /// Seconds between background purges of expired entries, 0 disables
    #[clap(long, default_value = "60")]
    pub sweep_interval: u64,

    #[clap(short, long, default_value = "data.sqlite")]
    pub db_path: String,

    #[clap(long, env = "NEWSAPI_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[clap(long, default_value = newsapi::DEFAULT_BASE_URL)]
    pub base_url: String,
}

pub struct AppState {
    pub config: Args,
    pub db: Connection,
    pub news: NewsService,
}

impl AppState {
    pub fn new(
        config: Args,
        db: Connection,
        api: Arc<dyn NewsApi>,
        cache: Arc<ResponseCache>,
    ) -> Self {
        let news = NewsService::new(api, cache, config.limit);
        Self { config, db, news }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        self.news.cache()
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(top_headlines)
        .service(everything)
        .service(sources)
        .service(get_profile)
        .service(put_profile)
        .service(cache_stats)
        .service(clear_cache)
        .service(invalidate_cache_entry);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    #[default]
    Json,
    Rss,
}

#[derive(Debug, Deserialize)]
pub struct ArticleParams {
    pub category: Option<Category>,
    pub q: Option<String>,
    pub page: Option<u32>,
    pub user: Option<String>,
    #[serde(default)]
    pub format: Format,
}

impl ArticleParams {
    fn page(&self) -> Result<u32, HttpResponse> {
        match self.page {
            None => Ok(1),
            Some(0) => Err(HttpResponse::BadRequest().body("page must start at 1")),
            Some(page) => Ok(page),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SourceParams {
    pub category: Option<Category>,
    pub user: Option<String>,
}

async fn resolve_user(
    app_data: &AppState,
    username: Option<&str>,
) -> Result<Option<UserContext>, HttpResponse> {
    let Some(username) = username else {
        return Ok(None);
    };

    match database::find_profile(&app_data.db, username).await {
        Ok(Some(profile)) => Ok(Some(profile)),
        Ok(None) => Err(HttpResponse::NotFound().body(format!("Unknown user: {username}"))),
        Err(e) => {
            error!("Failed to load profile {}: {}", username, e);
            Err(HttpResponse::InternalServerError().body("Failed to load profile"))
        }
    }
}

fn fetch_error_response(err: FetchError) -> HttpResponse {
    match err {
        FetchError::MissingQuery => HttpResponse::BadRequest().body(err.to_string()),
        err => {
            error!("Error fetching api response: {}", err);
            HttpResponse::BadGateway().body("Failed to fetch api response")
        }
    }
}

#[route("/top-headlines", method = "GET", method = "HEAD")]
async fn top_headlines(
    params: web::Query<ArticleParams>,
    app_data: web::Data<AppState>,
    req: HttpRequest,
) -> impl Responder {
    let page = match params.page() {
        Ok(page) => page,
        Err(resp) => return resp,
    };
    let user = match resolve_user(&app_data, params.user.as_deref()).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match app_data
        .news
        .top_headlines(params.category, params.q.as_deref(), page, user.as_ref())
        .await
    {
        Ok(result) => create_response(&req, params.format, "Top headlines", &result),
        Err(e) => fetch_error_response(e),
    }
}

#[route("/everything", method = "GET", method = "HEAD")]
async fn everything(
    params: web::Query<ArticleParams>,
    app_data: web::Data<AppState>,
    req: HttpRequest,
) -> impl Responder {
    let page = match params.page() {
        Ok(page) => page,
        Err(resp) => return resp,
    };
    let user = match resolve_user(&app_data, params.user.as_deref()).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };
    let query = params.q.as_deref().unwrap_or_default();

    match app_data
        .news
        .search(query, params.category, page, user.as_ref())
        .await
    {
        Ok(result) => {
            let title = format!("Search: {}", query.trim());
            create_response(&req, params.format, &title, &result)
        }
        Err(e) => fetch_error_response(e),
    }
}

#[get("/sources")]
async fn sources(params: web::Query<SourceParams>, app_data: web::Data<AppState>) -> impl Responder {
    let user = match resolve_user(&app_data, params.user.as_deref()).await {
        Ok(user) => user,
        Err(resp) => return resp,
    };

    match app_data.news.sources(params.category, user.as_ref()).await {
        Ok(sources) => HttpResponse::Ok().json(json!({ "sources": sources })),
        Err(e) => fetch_error_response(e),
    }
}

#[get("/profiles/{username}")]
async fn get_profile(username: web::Path<String>, app_data: web::Data<AppState>) -> impl Responder {
    match resolve_user(&app_data, Some(username.as_str())).await {
        Ok(profile) => HttpResponse::Ok().json(profile),
        Err(resp) => resp,
    }
}

#[put("/profiles/{username}")]
async fn put_profile(
    username: web::Path<String>,
    profile: web::Json<UserContext>,
    app_data: web::Data<AppState>,
) -> impl Responder {
    let profile = UserContext {
        language: profile.language.trim().to_lowercase(),
        country: profile.country.trim().to_lowercase(),
    };
    if !profile.is_valid() {
        return HttpResponse::BadRequest()
            .body("language and country must be two-letter codes, e.g. \"en\" and \"us\"");
    }

    match database::save_profile(&app_data.db, &username, &profile).await {
        Ok(()) => HttpResponse::Ok().json(profile),
        Err(e) => {
            error!("Failed to save profile {}: {}", username, e);
            HttpResponse::InternalServerError().body("Failed to save profile")
        }
    }
}

#[get("/cache")]
async fn cache_stats(app_data: web::Data<AppState>) -> impl Responder {
    let cache = app_data.cache();
    HttpResponse::Ok().json(json!({
        "entries": cache.len(),
        "ttlSeconds": cache.ttl().num_seconds(),
    }))
}

#[delete("/cache")]
async fn clear_cache(app_data: web::Data<AppState>) -> impl Responder {
    app_data.cache().clear();
    HttpResponse::NoContent().finish()
}

#[delete("/cache/{key:.*}")]
async fn invalidate_cache_entry(
    key: web::Path<String>,
    app_data: web::Data<AppState>,
) -> impl Responder {
    if app_data.cache().invalidate(&key) {
        HttpResponse::NoContent().finish()
    } else {
        HttpResponse::NotFound().body("No cache entry for key")
    }
}

fn create_response(req: &HttpRequest, format: Format, title: &str, page: &ArticlePage) -> HttpResponse {
    let last_modified = header::HttpDate::from(SystemTime::from(page.stored_at));

    let (content_type, body) = match format {
        Format::Json => (
            "application/json",
            json!({
                "key": page.key,
                "cached": page.from_cache,
                "storedAt": page.stored_at,
                "totalResults": page.articles.len(),
                "articles": &*page.articles,
            })
            .to_string(),
        ),
        Format::Rss => (
            "application/rss+xml",
            feed::render_rss(title, "https://newsapi.org", &page.articles),
        ),
    };

    let mut response = HttpResponse::Ok();
    response.insert_header((header::CONTENT_TYPE, content_type));
    response.insert_header((header::LAST_MODIFIED, last_modified.to_string()));
    response.insert_header(("X-Cache", if page.from_cache { "HIT" } else { "MISS" }));

    if req.method() == Method::HEAD {
        response
            .insert_header((header::CONTENT_LENGTH, body.len()))
            .finish()
    } else {
        response.body(body)
    }
}
