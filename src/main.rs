use std::{env, io, process, sync::Arc};

use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ical_trip_proxy::{
    cache::{self, FeedCache},
    cli,
    feed::HttpFeedSource,
    pipeline,
    server::{self, AppState},
};

const DEFAULT_LOG: &str = "ical_trip_proxy=info,tower_http=info";

fn setup_logging() {
    let filter = EnvFilter::try_from_env("LOG").unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let args = cli::parse(env::args().skip(1).collect());

    setup_logging();

    let source = match HttpFeedSource::new(args.timeout) {
        Ok(source) => source,
        Err(err) => {
            error!(error = %err, "Failed to build HTTP client");
            process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        source: Arc::new(source),
        cache: FeedCache::new(cache::Config {
            enabled: args.enable_cache,
            ttl: args.cache_ttl,
        }),
        pipeline: pipeline::Config {
            reference: args.timezone,
            max_occurrences: args.max_occurrences,
        },
    });

    let listener = TcpListener::bind(args.address).await?;
    info!(
        address = %args.address,
        timezone = %args.timezone,
        cache = args.enable_cache,
        "Listening"
    );

    axum::serve(listener, server::router(state))
        .with_graceful_shutdown(shutdown())
        .await
}

async fn shutdown() {
    if let Err(err) = signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
