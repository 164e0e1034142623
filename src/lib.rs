//! GraphiQL explorer for a GraphQL service.
//!
//! Browsers that hit the GraphQL endpoint get an interactive page seeded with
//! the request (and its pre-executed result); other clients get JSON from the
//! upstream engine.

use std::sync::Arc;

use axum::{routing::get, Router};

pub mod config;
pub mod executor;
pub mod handler;
pub mod page_state;
pub mod template;
pub mod types;
pub mod url_state;

pub struct AppState {
    pub pages: page_state::PageStateBuilder,
    pub executor: Arc<dyn executor::Executor>,
    pub page_enabled: bool,
}

impl AppState {
    pub fn initialize(config: config::Config) -> anyhow::Result<Arc<Self>> {
        let executor = Arc::new(executor::HttpExecutor::new(&config)?);
        let pages = page_state::PageStateBuilder::new(config.endpoints, config.versions);

        Ok(Arc::new(Self {
            pages,
            executor,
            page_enabled: config.page_enabled,
        }))
    }
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(
            "/graphql",
            get(handler::graphql_get).post(handler::graphql_post),
        )
        .route("/healthz", get(|| async { "ok" }))
        .with_state(state)
}
