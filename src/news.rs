use chrono::{DateTime, Utc};
use log::{debug, info};
use std::sync::Arc;

use crate::cache::{CacheEntry, ResponseCache};
use crate::cache_key::{cache_key, normalize_query, Endpoint};
use crate::model::{Article, Category, UserContext};
use crate::newsapi::{ArticleQuery, FetchError, NewsApi};

/// One page of articles together with where it came from.
#[derive(Debug, Clone)]
pub struct ArticlePage {
    pub key: String,
    pub articles: Arc<[Article]>,
    pub stored_at: DateTime<Utc>,
    pub from_cache: bool,
}

impl ArticlePage {
    fn new(key: String, entry: CacheEntry, from_cache: bool) -> Self {
        Self {
            key,
            articles: entry.articles,
            stored_at: entry.stored_at,
            from_cache,
        }
    }
}

/// Fronts the upstream API with the response cache.
///
/// Identical requests that miss at the same moment both go upstream and the
/// last one to finish wins the cache slot.
pub struct NewsService {
    api: Arc<dyn NewsApi>,
    cache: Arc<ResponseCache>,
    page_size: u16,
}

impl NewsService {
    pub fn new(api: Arc<dyn NewsApi>, cache: Arc<ResponseCache>, page_size: u16) -> Self {
        Self {
            api,
            cache,
            page_size,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub async fn top_headlines(
        &self,
        category: Option<Category>,
        query: Option<&str>,
        page: u32,
        user: Option<&UserContext>,
    ) -> Result<ArticlePage, FetchError> {
        let key = cache_key(Endpoint::TopHeadlines, category, query, page, user);
        let request = ArticleQuery::top_headlines(
            category,
            normalize_query(query),
            page,
            self.page_size,
            user,
        );
        self.fetch_cached(key, &request).await
    }

    pub async fn search(
        &self,
        query: &str,
        category: Option<Category>,
        page: u32,
        user: Option<&UserContext>,
    ) -> Result<ArticlePage, FetchError> {
        let query = normalize_query(Some(query)).ok_or(FetchError::MissingQuery)?;
        let key = cache_key(Endpoint::Everything, category, Some(query), page, user);
        let request = ArticleQuery::everything(query, category, page, self.page_size, user);
        self.fetch_cached(key, &request).await
    }

    /// Source ids are cheap to fetch and are not cached.
    pub async fn sources(
        &self,
        category: Option<Category>,
        user: Option<&UserContext>,
    ) -> Result<Vec<String>, FetchError> {
        self.api.fetch_sources(category, user).await
    }

    async fn fetch_cached(
        &self,
        key: String,
        request: &ArticleQuery,
    ) -> Result<ArticlePage, FetchError> {
        if let Some(entry) = self.cache.lookup(&key) {
            debug!("Returning cached articles for: {}", key);
            return Ok(ArticlePage::new(key, entry, true));
        }

        // no cache lock is held across the upstream call
        let articles = self.api.fetch_articles(request).await?;
        info!("Fetched {} articles for: {}", articles.len(), key);

        let entry = self.cache.store(key.clone(), articles);
        Ok(ArticlePage::new(key, entry, false))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeApi {
        calls: AtomicUsize,
        requests: Mutex<Vec<ArticleQuery>>,
        fail: bool,
    }

    impl FakeApi {
        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl NewsApi for FakeApi {
        async fn fetch_articles(&self, query: &ArticleQuery) -> Result<Vec<Article>, FetchError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(query.clone());
            // let a concurrent caller reach its own lookup
            tokio::task::yield_now().await;
            if self.fail {
                return Err(FetchError::Status(500));
            }
            Ok(vec![Article {
                id: n.to_string(),
                title: format!("{} #{}", query.endpoint, n),
                description: String::new(),
                content: String::new(),
                author: String::new(),
                url: String::new(),
                image_url: String::new(),
                published_at: None,
                source: String::new(),
                category: query.category,
            }])
        }

        async fn fetch_sources(
            &self,
            _category: Option<Category>,
            _user: Option<&UserContext>,
        ) -> Result<Vec<String>, FetchError> {
            Ok(vec!["bbc-news".into()])
        }
    }

    fn service(api: Arc<FakeApi>) -> (NewsService, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = Arc::new(ResponseCache::with_clock(Duration::minutes(15), clock.clone()));
        (NewsService::new(api, cache, 20), clock)
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let api = Arc::new(FakeApi::default());
        let (news, _) = service(api.clone());

        let first = news
            .top_headlines(Some(Category::Business), None, 1, None)
            .await
            .unwrap();
        assert!(!first.from_cache);
        assert_eq!(first.key, "top-headlines_cat-business_p-1");

        let second = news
            .top_headlines(Some(Category::Business), None, 1, None)
            .await
            .unwrap();
        assert!(second.from_cache);
        assert_eq!(second.stored_at, first.stored_at);
        assert_eq!(second.articles[0].title, first.articles[0].title);
        assert_eq!(api.calls(), 1);
    }

    #[tokio::test]
    async fn expired_entry_triggers_refetch() {
        let api = Arc::new(FakeApi::default());
        let (news, clock) = service(api.clone());

        news.search("rust", None, 1, None).await.unwrap();
        clock.advance(Duration::minutes(15) + Duration::seconds(1));
        let page = news.search("rust", None, 1, None).await.unwrap();

        assert!(!page.from_cache);
        assert_eq!(page.articles[0].title, "everything #1");
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn user_and_anonymous_requests_are_cached_separately() {
        let api = Arc::new(FakeApi::default());
        let (news, _) = service(api.clone());
        let user = UserContext::default();

        let anonymous = news.top_headlines(None, None, 1, None).await.unwrap();
        let scoped = news.top_headlines(None, None, 1, Some(&user)).await.unwrap();

        assert_ne!(anonymous.key, scoped.key);
        assert!(!scoped.from_cache);
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn search_trims_and_requires_query() {
        let api = Arc::new(FakeApi::default());
        let (news, _) = service(api.clone());

        assert!(matches!(
            news.search("   ", None, 1, None).await,
            Err(FetchError::MissingQuery)
        ));
        assert_eq!(api.calls(), 0);

        let page = news.search("  climate ", None, 2, None).await.unwrap();
        assert_eq!(page.key, "everything_q-climate_p-2");
        let requests = api.requests.lock().unwrap();
        assert_eq!(requests[0].query.as_deref(), Some("climate"));
        assert_eq!(requests[0].page_size, 20);
    }

    #[tokio::test]
    async fn failures_are_not_cached() {
        let api = Arc::new(FakeApi {
            fail: true,
            ..Default::default()
        });
        let (news, _) = service(api.clone());

        assert!(news.top_headlines(None, None, 1, None).await.is_err());
        assert!(news.cache().is_empty());
        assert!(news.top_headlines(None, None, 1, None).await.is_err());
        assert_eq!(api.calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_misses_both_fetch() {
        let api = Arc::new(FakeApi::default());
        let (news, _) = service(api.clone());

        let (a, b) = futures::join!(
            news.top_headlines(None, Some("x"), 1, None),
            news.top_headlines(None, Some("x"), 1, None)
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert!(!a.from_cache && !b.from_cache);
        assert_eq!(api.calls(), 2);
        assert_eq!(news.cache().len(), 1);
        let cached = news.cache().get(&a.key).unwrap();
        assert!(cached[0].title == a.articles[0].title || cached[0].title == b.articles[0].title);
    }

    #[tokio::test]
    async fn sources_pass_through() {
        let api = Arc::new(FakeApi::default());
        let (news, _) = service(api.clone());
        assert_eq!(news.sources(None, None).await.unwrap(), vec!["bbc-news"]);
        assert!(news.cache().is_empty());
    }
}
