//! bodega-api library
//!
//! Multi-warehouse stock coordination: per-warehouse stock ledger,
//! sale-ready availability aggregation, and the auditable inter-warehouse
//! transfer workflow.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod services;
pub mod stock;

use std::time::Duration;

use axum::Router;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::events::{Event, EventSender};

const EVENT_FEED_CAPACITY: usize = 256;
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Shared application state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    pub services: services::AppServices,
    pub event_sender: EventSender,
    /// Re-broadcast side of the event pipeline; notifier subscribers
    /// (pending-approvals feed, UI badges) attach here.
    pub events_feed: broadcast::Sender<Event>,
}

/// Builds the state graph plus the receiving half of the event queue the
/// caller must hand to [`events::process_events`].
pub fn build_state(config: config::AppConfig) -> (AppState, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
    let event_sender = EventSender::new(event_tx);
    let (feed_tx, _) = broadcast::channel(EVENT_FEED_CAPACITY);
    let services = services::AppServices::new(&config, event_sender.clone());
    (
        AppState {
            config,
            services,
            event_sender,
            events_feed: feed_tx,
        },
        event_rx,
    )
}

/// Standard response envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }
}

/// Assembles the router with the standard middleware stack.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    handlers::api_router()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(TimeoutLayer::new(Duration::from_secs(REQUEST_TIMEOUT_SECS)))
        .with_state(state)
}
