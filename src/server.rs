use std::sync::Arc;

use axum::{
    extract::{Query, Request, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, info_span, warn, Span};

use crate::cache::FeedCache;
use crate::error::{Error, Result};
use crate::feed::FeedSource;
use crate::parser::parse_calendar;
use crate::pipeline;
use crate::structs::{Calendar, TripEvent};

pub const FEED_PATH: &str = "/api/ParseICalFeed";

pub struct AppState {
    pub source: Arc<dyn FeedSource>,
    pub cache: FeedCache,
    pub pipeline: pipeline::Config,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(FEED_PATH, get(handle_feed))
        .fallback(|| async { (StatusCode::NOT_FOUND, "Not found") })
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .with_state(state)
}

/// The query holds the feed url, so spans carry the path only.
fn request_span(request: &Request) -> Span {
    info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
    )
}

#[derive(Deserialize)]
struct FeedQuery {
    #[serde(rename = "icalFeedUrl")]
    ical_feed_url: Option<String>,
}

async fn handle_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FeedQuery>,
) -> Result<Json<Vec<TripEvent>>> {
    let Some(url) = query.ical_feed_url.filter(|url| !url.trim().is_empty()) else {
        warn!("Request without feed url");
        return Err(Error::MissingUrl);
    };

    let host = feed_host(&url);

    let trips = trip_events(&state, &url).await.map_err(|err| {
        warn!(feed = %host, error = %err, "Failed to process feed");
        err
    })?;

    info!(feed = %host, trips = trips.len(), "Processed feed");
    Ok(Json(trips))
}

async fn trip_events(state: &AppState, url: &str) -> Result<Vec<TripEvent>> {
    let calendar = load_calendar(state, url).await?;
    pipeline::trip_events(&calendar, Utc::now(), &state.pipeline)
}

async fn load_calendar(state: &AppState, url: &str) -> Result<Arc<Calendar>> {
    if let Some(calendar) = state.cache.get(url) {
        debug!("Serving cached feed");
        return Ok(calendar);
    }

    let text = state.source.fetch(url).await?;
    let calendar = parse_calendar(&text)?;

    Ok(state.cache.insert(url.to_owned(), calendar))
}

/// Feed URLs often embed private tokens, so only the host is logged.
fn feed_host(url: &str) -> String {
    Url::parse(url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_owned))
        .unwrap_or_else(|| "<invalid url>".to_owned())
}
