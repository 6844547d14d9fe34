use actix_web::{middleware::Logger, web, App, HttpServer};
use chrono::Duration;
use clap::Parser;
use log::{error, info};
use news_cache_proxy::{
    cache::{spawn_sweeper, ResponseCache},
    configure, database,
    newsapi::NewsApiClient,
    AppState, Args,
};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let address = format!("{}:{}", args.ip, args.port);

    let Some(api_key) = args.api_key.clone().filter(|k| !k.trim().is_empty()) else {
        error!("No NewsAPI key given, pass --api-key or set NEWSAPI_KEY");
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Missing NewsAPI key",
        ));
    };

    let conn = database::init_db(&args.db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "Database initialization failed")
    })?;

    let api = NewsApiClient::new(&args.base_url, &api_key).map_err(|e| {
        error!("Failed to build http client: {}", e);
        std::io::Error::new(std::io::ErrorKind::Other, "HTTP client initialization failed")
    })?;

    let cache = Arc::new(ResponseCache::with_ttl(Duration::seconds(
        args.cache_lifetime.into(),
    )));
    let sweeper = spawn_sweeper(
        cache.clone(),
        std::time::Duration::from_secs(args.sweep_interval),
    );

    let app_state = web::Data::new(AppState::new(
        args,
        conn.clone(),
        Arc::new(api),
        cache,
    ));

    info!("Server running at http://{}", address);
    let res = HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind(&address)?
    .run()
    .await;

    if let Some(sweeper) = sweeper {
        sweeper.abort();
    }
    let _ = conn.close().await;
    res
}
