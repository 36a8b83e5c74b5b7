use std::time::Duration;

use actix_web::middleware::{Logger, NormalizePath};
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get};
use anyhow::Context;
use tracing::{error, info};
use tracing_appender::rolling;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi; // needed for ApiDoc::openapi()
use utoipa_swagger_ui::SwaggerUi;

use hrms::cache::CacheHandle;
use hrms::config::Config;
use hrms::db::{init_db, run_migrations};
use hrms::docs::ApiDoc;
use hrms::routes;
use hrms::utils::username_cache::UsernameCache;

#[get("/")]
async fn index() -> impl Responder {
    "HRMS is running"
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(addr = %config.server_addr, "Server starting...");

    let pool = init_db(&config.database_url).await?;
    run_migrations(&pool).await?;

    let cache = CacheHandle::connect(config.redis_url.as_deref(), config.cache_ttl_secs).await;
    info!(enabled = cache.is_enabled(), "Shared cache ready");

    let usernames = UsernameCache::default();

    let pool_for_warmup = pool.clone();
    let usernames_for_warmup = usernames.clone();
    actix_web::rt::spawn(async move {
        // last 30 days of accounts, in batches of 250
        if let Err(e) = usernames_for_warmup.warmup(&pool_for_warmup, 30, 250).await {
            error!(error = ?e, "Failed to warm up username cache");
        }
    });

    ensure_upload_dir(&config.upload_dir)?;

    let server_addr = config.server_addr.clone();
    let pool = Data::new(pool);
    let config_data = Data::new(config.clone());
    let usernames = Data::new(usernames);
    let cache = Data::new(cache);

    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} so the UI's JS/CSS files match
                SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
            .app_data(pool.clone())
            .app_data(config_data.clone())
            .app_data(usernames.clone())
            .app_data(cache.clone())
            .service(index)
            // auth + protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, config.clone()))
    })
    .keep_alive(Duration::from_secs(75))
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}

/// Uploads are written under this directory; create it up front so a bad
/// path fails at startup instead of on the first upload.
fn ensure_upload_dir(dir: &str) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir).with_context(|| format!("Cannot create upload dir {dir}"))
}
