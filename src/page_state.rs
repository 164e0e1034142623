//! Server-side preparation of the explorer page state.
//!
//! [`PageStateBuilder`] turns a [`RequestSnapshot`] into a [`RenderContext`]:
//! it runs the query once (when there is one), serializes variables and the
//! result as indented JSON, and encodes every value that ends up inside the
//! page's `<script>` as a script-safe JSON string literal.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::executor::{ExecutionError, Executor};
use crate::types::{EndpointConfig, LibraryVersions, RequestSnapshot, ResponseSnapshot};

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum PageError {
    #[error(transparent)]
    Build(#[from] BuildError),
    #[error("execution failed: {0}")]
    Execution(#[from] ExecutionError),
}

/// A string together with its encoding as a JSON string literal that is safe
/// inside an HTML `<script>` element.
///
/// Besides the usual JSON escapes, `<`, `>` and `&` become `\u003c`, `\u003e`
/// and `\u0026` so the text can never form `</script>` or `<!--`, and the JS
/// line terminators U+2028/U+2029 are escaped as well.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLiteral {
    raw: String,
    encoded: String,
}

impl ScriptLiteral {
    pub fn new(raw: impl Into<String>) -> Result<Self, BuildError> {
        let raw = raw.into();
        let json = serde_json::to_string(&raw)?;

        let mut encoded = String::with_capacity(json.len());
        for c in json.chars() {
            match c {
                '<' => encoded.push_str("\\u003c"),
                '>' => encoded.push_str("\\u003e"),
                '&' => encoded.push_str("\\u0026"),
                '\u{2028}' => encoded.push_str("\\u2028"),
                '\u{2029}' => encoded.push_str("\\u2029"),
                c => encoded.push(c),
            }
        }

        Ok(Self { raw, encoded })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn encoded(&self) -> &str {
        &self.encoded
    }
}

/// Whether the page wires up the streaming (subscriptions) transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    WithSubscriptions { url: ScriptLiteral },
    WithoutSubscriptions,
}

/// Everything the template needs, already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContext {
    query: ScriptLiteral,
    result: ScriptLiteral,
    variables: ScriptLiteral,
    operation_name: ScriptLiteral,
    endpoint: ScriptLiteral,
    transport: Transport,
    versions: Arc<LibraryVersions>,
}

impl RenderContext {
    pub fn query(&self) -> &ScriptLiteral {
        &self.query
    }

    /// Indented JSON of the pre-executed result, or empty.
    pub fn result(&self) -> &ScriptLiteral {
        &self.result
    }

    /// Indented JSON of the request variables, or empty.
    pub fn variables(&self) -> &ScriptLiteral {
        &self.variables
    }

    pub fn operation_name(&self) -> &ScriptLiteral {
        &self.operation_name
    }

    pub fn endpoint(&self) -> &ScriptLiteral {
        &self.endpoint
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn versions(&self) -> &LibraryVersions {
        &self.versions
    }
}

/// Builds render contexts against a fixed endpoint configuration.
///
/// The configuration is set once here and only read afterwards, so one
/// builder can serve any number of concurrent renders.
#[derive(Debug, Clone, Default)]
pub struct PageStateBuilder {
    endpoints: Option<Arc<EndpointConfig>>,
    versions: Arc<LibraryVersions>,
}

impl PageStateBuilder {
    pub fn new(endpoints: Option<EndpointConfig>, versions: LibraryVersions) -> Self {
        Self {
            endpoints: endpoints.map(Arc::new),
            versions: Arc::new(versions),
        }
    }

    pub async fn build(
        &self,
        snapshot: &RequestSnapshot,
        executor: &dyn Executor,
    ) -> Result<RenderContext, PageError> {
        let variables = if snapshot.variables.is_empty() {
            pretty_json(&serde_json::Value::Null)?
        } else {
            pretty_json(&snapshot.variables)?
        };

        let response = execute(snapshot, executor).await?;
        let result = match &response.result {
            Some(value) => pretty_json(value)?,
            None => String::new(),
        };

        let (endpoint, subscriptions_endpoint) = match self.endpoints.as_deref() {
            Some(config) => (
                config.endpoint.as_str(),
                config.subscriptions_endpoint.as_str(),
            ),
            None => ("", ""),
        };

        let transport = if subscriptions_endpoint.is_empty() {
            Transport::WithoutSubscriptions
        } else {
            Transport::WithSubscriptions {
                url: ScriptLiteral::new(subscriptions_endpoint)?,
            }
        };

        Ok(RenderContext {
            query: ScriptLiteral::new(snapshot.query_text.as_str())?,
            result: ScriptLiteral::new(result)?,
            variables: ScriptLiteral::new(variables)?,
            operation_name: ScriptLiteral::new(snapshot.operation_name.as_str())?,
            endpoint: ScriptLiteral::new(endpoint)?,
            transport,
            versions: self.versions.clone(),
        })
    }
}

/// Runs the snapshot's query, unless there is none.
pub async fn execute(
    snapshot: &RequestSnapshot,
    executor: &dyn Executor,
) -> Result<ResponseSnapshot, ExecutionError> {
    if snapshot.query_text.is_empty() {
        debug!("empty query, skipping pre-execution");
        return Ok(ResponseSnapshot::default());
    }

    let result = executor.execute(snapshot).await?;
    Ok(ResponseSnapshot {
        result: Some(result),
    })
}

/// Two-space indented JSON. A bare `null` becomes the empty string so the
/// editor shows an empty pane instead of the text "null".
pub fn pretty_json<T: Serialize + ?Sized>(value: &T) -> Result<String, BuildError> {
    let text = serde_json::to_string_pretty(value)?;
    if text == "null" {
        Ok(String::new())
    } else {
        Ok(text)
    }
}
