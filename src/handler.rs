use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{RawQuery, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Response},
    Json,
};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::{
    executor::{ExecutionError, Executor, WithPassThrough},
    page_state::{BuildError, PageError},
    template::{self, TemplateError},
    types::{GraphQlRequest, RequestSnapshot},
    url_state::{has_flag, FetchOutcome, UrlParameters},
    AppState,
};

#[derive(Debug, thiserror::Error)]
pub enum ExplorerError {
    #[error("failed to prepare page: {0}")]
    Build(#[from] BuildError),
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),
    #[error("failed to render page: {0}")]
    Template(#[from] TemplateError),
    #[error("invalid request body: {0}")]
    InvalidBody(serde_json::Error),
}

impl From<PageError> for ExplorerError {
    fn from(err: PageError) -> Self {
        match err {
            PageError::Build(e) => Self::Build(e),
            PageError::Execution(e) => Self::Execution(e),
        }
    }
}

impl IntoResponse for ExplorerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ExplorerError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ExplorerError::Execution(_) => StatusCode::BAD_GATEWAY,
            ExplorerError::Build(_) | ExplorerError::Template(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        error!(%status, error = %self, "request failed");
        (status, self.to_string()).into_response()
    }
}

/// GET: the explorer page for browsers, the JSON result for everyone else.
pub async fn graphql_get(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Result<Response, ExplorerError> {
    let request_id = Uuid::new_v4();
    let search = query.unwrap_or_default();
    let params = UrlParameters::parse(&search);
    let snapshot = params.to_snapshot();

    if state.page_enabled && accepts_html(&headers) && !has_flag(&search, "raw") {
        info!(%request_id, has_query = !snapshot.query_text.is_empty(), "rendering explorer page");
        let pass_through = params.pass_through();
        let executor = WithPassThrough::new(state.executor.as_ref(), &pass_through);
        let ctx = state.pages.build(&snapshot, &executor).await?;
        let body = template::render(&ctx)?;
        return Ok(Html(body).into_response());
    }

    debug!(%request_id, "executing GET request");
    execute(&state, &snapshot, &params).await
}

/// POST: operations issued by the explorer's fetcher (or any client).
pub async fn graphql_post(
    State(state): State<Arc<AppState>>,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Result<Response, ExplorerError> {
    let request_id = Uuid::new_v4();
    let request: GraphQlRequest =
        serde_json::from_slice(&body).map_err(ExplorerError::InvalidBody)?;
    let snapshot = RequestSnapshot::from(request);
    let params = UrlParameters::parse(query.as_deref().unwrap_or_default());

    debug!(%request_id, operation = %snapshot.operation_name, "executing POST request");
    execute(&state, &snapshot, &params).await
}

async fn execute(
    state: &AppState,
    snapshot: &RequestSnapshot,
    params: &UrlParameters,
) -> Result<Response, ExplorerError> {
    let forwarded = state
        .executor
        .forward(snapshot, &params.pass_through())
        .await?;
    let status = StatusCode::from_u16(forwarded.status).unwrap_or(StatusCode::BAD_GATEWAY);

    Ok(match forwarded.body {
        FetchOutcome::Json(value) => (status, Json(value)).into_response(),
        FetchOutcome::Raw(text) => (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
    })
}

fn accepts_html(headers: &HeaderMap) -> bool {
    headers
        .get_all(header::ACCEPT)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.contains("text/html"))
}
