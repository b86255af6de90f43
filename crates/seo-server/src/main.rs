mod config;
mod error;
mod rate_limit;
mod server;

use std::sync::Arc;

use rmcp::{ServiceExt, transport::stdio};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use seo_common::openai::{OpenAiClient, OpenAiClientConfig};
use seo_common::pagespeed::{PageSpeedClient, PageSpeedConfig};
use seo_common::redis::RedisCache;
use seo_common::serp::{SerpApiClient, SerpApiConfig};
use seo_pipeline::cache::DataSourceCache;
use seo_pipeline::SeoAnalyzer;

use config::Config;
use rate_limit::RateLimiter;
use server::SeoAnalysisServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout is reserved for MCP JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    info!("starting seo-server MCP server");

    let config = Config::from_env()?;

    let openai_config = OpenAiClientConfig::from_env()?;
    info!(
        base_url = %openai_config.base_url,
        model = %openai_config.model,
        web_search = openai_config.web_search,
        timeout_ms = openai_config.default_timeout.as_millis(),
        max_retries = openai_config.retry.max_retries,
        "text generation client configured"
    );
    let llm = Arc::new(OpenAiClient::new(openai_config)?);

    let pagespeed_config = PageSpeedConfig::from_env()?;
    info!(
        strategy = %pagespeed_config.strategy,
        keyed = pagespeed_config.api_key.is_some(),
        "performance audit client configured"
    );
    let audits = Arc::new(PageSpeedClient::new(pagespeed_config)?);

    let serp_config = SerpApiConfig::from_env()?;
    info!(num_results = serp_config.num_results, "search client configured");
    let search = Arc::new(SerpApiClient::new(serp_config)?);

    let redis = RedisCache::new(config.redis_url.as_deref());
    if redis.is_available().await {
        info!(ttl_secs = config.cache_ttl_secs, "redis connected, caching audits and searches");
    } else {
        info!("redis unavailable, running without cache");
    }
    let cache = Arc::new(DataSourceCache::new(redis, config.cache_ttl_secs));

    let analyzer = Arc::new(
        SeoAnalyzer::new(audits, search, llm, config.pipeline_options()).with_cache(cache),
    );
    let limiter = config.rate_limit_rps.map(RateLimiter::new);
    let server = SeoAnalysisServer::new(analyzer, limiter);

    if let Some(addr) = &config.tcp_listen_addr {
        let listener = TcpListener::bind(addr).await?;
        info!(listen_addr = %addr, "MCP server ready, serving on TCP");
        loop {
            let (stream, peer) = listener.accept().await?;
            let server = server.clone();
            tokio::spawn(async move {
                info!(peer = %peer, "MCP client connected");
                let service = server.serve(stream).await.inspect_err(|e| {
                    tracing::error!(error = %e, "MCP server error");
                })?;
                service.waiting().await?;
                info!(peer = %peer, "MCP client disconnected");
                Ok::<(), anyhow::Error>(())
            });
        }
    } else {
        info!("MCP server ready, serving on stdio");
        let service = server.serve(stdio()).await.inspect_err(|e| {
            tracing::error!(error = %e, "MCP server error");
        })?;
        service.waiting().await?;
        info!("MCP server shut down");
    }
    Ok(())
}
