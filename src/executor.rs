use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::Config;
use crate::types::RequestSnapshot;
use crate::url_state::{FetchOutcome, UrlParameters};

const ERROR_BODY_LIMIT: usize = 512;

#[derive(thiserror::Error, Debug)]
pub enum ExecutionError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("upstream failed with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream returned a non-JSON body (status {status}): {body}")]
    NonJsonBody { status: u16, body: String },
    #[error("engine error: {0}")]
    Engine(String),
}

/// An engine response as received: the HTTP status and the leniently parsed
/// body.
#[derive(Debug, Clone, PartialEq)]
pub struct Forwarded {
    pub status: u16,
    pub body: FetchOutcome,
}

impl Forwarded {
    pub fn ok(value: Value) -> Self {
        Self {
            status: 200,
            body: FetchOutcome::Json(value),
        }
    }

    /// The result of a successful execution. 4xx JSON bodies are GraphQL
    /// error responses and count as results; 5xx and non-JSON bodies do not.
    pub fn into_result(self) -> Result<Value, ExecutionError> {
        match self.body {
            FetchOutcome::Json(value) if self.status < 500 => Ok(value),
            FetchOutcome::Json(value) => Err(ExecutionError::Status {
                status: self.status,
                body: truncate(&value.to_string()),
            }),
            FetchOutcome::Raw(body) => Err(ExecutionError::NonJsonBody {
                status: self.status,
                body: truncate(&body),
            }),
        }
    }
}

fn truncate(body: &str) -> String {
    body.chars().take(ERROR_BODY_LIMIT).collect()
}

/// The query engine. Takes `{query, variables, operationName}` plus the
/// caller's pass-through parameters and returns the engine's response.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn forward(
        &self,
        request: &RequestSnapshot,
        pass_through: &UrlParameters,
    ) -> Result<Forwarded, ExecutionError>;

    /// Executes with no pass-through parameters and requires a successful
    /// JSON result.
    async fn execute(&self, request: &RequestSnapshot) -> Result<Value, ExecutionError> {
        self.forward(request, &UrlParameters::new())
            .await?
            .into_result()
    }
}

/// Binds an executor to one request's pass-through parameters, so
/// pre-execution for the page reaches the engine with the same parameters
/// as the browser's later fetches.
pub struct WithPassThrough<'a> {
    inner: &'a dyn Executor,
    pass_through: &'a UrlParameters,
}

impl<'a> WithPassThrough<'a> {
    pub fn new(inner: &'a dyn Executor, pass_through: &'a UrlParameters) -> Self {
        Self {
            inner,
            pass_through,
        }
    }
}

#[async_trait]
impl<'a> Executor for WithPassThrough<'a> {
    async fn forward(
        &self,
        request: &RequestSnapshot,
        pass_through: &UrlParameters,
    ) -> Result<Forwarded, ExecutionError> {
        self.inner.forward(request, pass_through).await
    }

    async fn execute(&self, request: &RequestSnapshot) -> Result<Value, ExecutionError> {
        self.inner
            .forward(request, self.pass_through)
            .await?
            .into_result()
    }
}

/// Executes operations by POSTing them to an upstream GraphQL endpoint.
pub struct HttpExecutor {
    client: Client,
    upstream_url: String,
}

impl HttpExecutor {
    pub fn new(config: &Config) -> Result<Self, ExecutionError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.upstream_timeout_ms))
            .build()?;
        Ok(Self {
            client,
            upstream_url: config.upstream_url.clone(),
        })
    }

    fn target(&self, pass_through: &UrlParameters) -> String {
        let verbatim: Vec<&str> = pass_through.verbatim().collect();
        if verbatim.is_empty() {
            return self.upstream_url.clone();
        }
        let sep = if self.upstream_url.contains('?') { '&' } else { '?' };
        format!("{}{}{}", self.upstream_url, sep, verbatim.join("&"))
    }
}

#[async_trait]
impl Executor for HttpExecutor {
    async fn forward(
        &self,
        request: &RequestSnapshot,
        pass_through: &UrlParameters,
    ) -> Result<Forwarded, ExecutionError> {
        let pairs: Vec<(&str, &str)> = pass_through.iter().collect();
        let resp = self
            .client
            .post(self.target(pass_through))
            .query(&pairs)
            .header(header::ACCEPT, "application/json")
            .json(&request.to_wire())
            .send()
            .await?;

        let status = resp.status().as_u16();
        let text = resp.text().await?;
        let body = FetchOutcome::from_body(&text);
        match &body {
            FetchOutcome::Json(_) if status >= 500 => warn!(status, "upstream failed"),
            FetchOutcome::Raw(_) => warn!(status, "upstream body is not JSON"),
            FetchOutcome::Json(_) => debug!(status, bytes = text.len(), "upstream responded"),
        }

        Ok(Forwarded { status, body })
    }
}

#[cfg(test)]
mod tests {
    use axum::{extract::RawQuery, http::StatusCode, routing::post, Json, Router};
    use serde_json::json;

    use super::*;
    use crate::types::LibraryVersions;

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route(
                "/json",
                post(|RawQuery(q): RawQuery, Json(body): Json<Value>| async move {
                    Json(json!({"data": {"body": body, "params": q}}))
                }),
            )
            .route(
                "/html",
                post(|| async { (StatusCode::BAD_GATEWAY, "<html>bad gateway</html>") }),
            )
            .route(
                "/crash",
                post(|| async {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        Json(json!({"error": "engine crashed"})),
                    )
                }),
            )
            .route(
                "/bad-request",
                post(|| async {
                    (
                        StatusCode::BAD_REQUEST,
                        Json(json!({"errors": [{"message": "Syntax Error"}]})),
                    )
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn executor(upstream_url: String) -> HttpExecutor {
        HttpExecutor::new(&Config {
            bind_addr: "127.0.0.1:0".into(),
            upstream_url,
            upstream_timeout_ms: 5000,
            page_enabled: true,
            endpoints: None,
            versions: LibraryVersions::default(),
        })
        .unwrap()
    }

    fn json_body(forwarded: Forwarded) -> Value {
        match forwarded.body {
            FetchOutcome::Json(value) => value,
            other => panic!("unexpected body {other:?}"),
        }
    }

    #[tokio::test]
    async fn posts_wire_body_upstream() {
        let base = spawn_upstream().await;
        let mut snapshot = RequestSnapshot::new("query Q { a }");
        snapshot.operation_name = "Q".into();

        let value = executor(format!("{base}/json"))
            .execute(&snapshot)
            .await
            .unwrap();
        assert_eq!(
            value["data"]["body"],
            json!({"query": "query Q { a }", "variables": null, "operationName": "Q"})
        );
    }

    #[tokio::test]
    async fn forwards_pass_through_params() {
        let base = spawn_upstream().await;
        let mut params = UrlParameters::new();
        params.set("trace", "on");

        let forwarded = executor(format!("{base}/json"))
            .forward(&RequestSnapshot::new("{ a }"), &params)
            .await
            .unwrap();
        assert_eq!(forwarded.status, 200);
        assert_eq!(json_body(forwarded)["data"]["params"], "trace=on");
    }

    #[tokio::test]
    async fn undecodable_entries_reach_upstream_verbatim() {
        let base = spawn_upstream().await;
        let params = UrlParameters::parse("query=%7B%20a%20%7D&bad=%zz&trace=on").pass_through();

        let forwarded = executor(format!("{base}/json"))
            .forward(&RequestSnapshot::new("{ a }"), &params)
            .await
            .unwrap();
        assert_eq!(json_body(forwarded)["data"]["params"], "bad=%zz&trace=on");
    }

    #[tokio::test]
    async fn non_json_body_is_an_execution_error() {
        let base = spawn_upstream().await;
        let exec = executor(format!("{base}/html"));

        let err = exec.execute(&RequestSnapshot::new("{ a }")).await.unwrap_err();
        match err {
            ExecutionError::NonJsonBody { status, body } => {
                assert_eq!(status, 502);
                assert_eq!(body, "<html>bad gateway</html>");
            }
            other => panic!("unexpected error {other:?}"),
        }

        let forwarded = exec
            .forward(&RequestSnapshot::new("{ a }"), &UrlParameters::new())
            .await
            .unwrap();
        assert_eq!(forwarded.status, 502);
        assert_eq!(forwarded.body, FetchOutcome::Raw("<html>bad gateway</html>".into()));
    }

    #[tokio::test]
    async fn server_error_status_fails_execution() {
        let base = spawn_upstream().await;
        let exec = executor(format!("{base}/crash"));

        let err = exec.execute(&RequestSnapshot::new("{ a }")).await.unwrap_err();
        match err {
            ExecutionError::Status { status, body } => {
                assert_eq!(status, 500);
                assert!(body.contains("engine crashed"));
            }
            other => panic!("unexpected error {other:?}"),
        }

        let forwarded = exec
            .forward(&RequestSnapshot::new("{ a }"), &UrlParameters::new())
            .await
            .unwrap();
        assert_eq!(forwarded.status, 500);
        assert_eq!(json_body(forwarded), json!({"error": "engine crashed"}));
    }

    #[tokio::test]
    async fn client_error_body_is_a_result() {
        let base = spawn_upstream().await;
        let value = executor(format!("{base}/bad-request"))
            .execute(&RequestSnapshot::new("{ a"))
            .await
            .unwrap();
        assert_eq!(value["errors"][0]["message"], "Syntax Error");
    }

    #[tokio::test]
    async fn bound_pass_through_reaches_execute() {
        let base = spawn_upstream().await;
        let exec = executor(format!("{base}/json"));
        let mut params = UrlParameters::new();
        params.set("tenant", "a b");

        let value = WithPassThrough::new(&exec, &params)
            .execute(&RequestSnapshot::new("{ a }"))
            .await
            .unwrap();
        assert_eq!(value["data"]["params"], "tenant=a+b");
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let err = Forwarded {
            status: 503,
            body: FetchOutcome::Raw("x".repeat(2 * ERROR_BODY_LIMIT)),
        }
        .into_result()
        .unwrap_err();
        match err {
            ExecutionError::NonJsonBody { body, .. } => assert_eq!(body.len(), ERROR_BODY_LIMIT),
            other => panic!("unexpected error {other:?}"),
        }
    }
}
