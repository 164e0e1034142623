use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const DEFAULT_GRAPHIQL_VERSION: &str = "0.11.10";
pub const DEFAULT_SUBSCRIPTIONS_TRANSPORT_VERSION: &str = "0.8.2";
pub const DEFAULT_SUBSCRIPTIONS_FETCHER_VERSION: &str = "0.0.2";
pub const DEFAULT_REACT_VERSION: &str = "15.4.2";
pub const DEFAULT_FETCH_POLYFILL_VERSION: &str = "2.0.1";

/// Request state captured before a render. An empty `variables` map means
/// no variables were supplied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestSnapshot {
    pub query_text: String,
    pub variables: Map<String, Value>,
    pub operation_name: String,
}

impl RequestSnapshot {
    pub fn new(query_text: impl Into<String>) -> Self {
        Self {
            query_text: query_text.into(),
            ..Self::default()
        }
    }

    pub fn to_wire(&self) -> GraphQlRequest {
        GraphQlRequest {
            query: self.query_text.clone(),
            variables: if self.variables.is_empty() {
                Value::Null
            } else {
                Value::Object(self.variables.clone())
            },
            operation_name: if self.operation_name.is_empty() {
                None
            } else {
                Some(self.operation_name.clone())
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseSnapshot {
    pub result: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EndpointConfig {
    pub endpoint: String,
    pub subscriptions_endpoint: String,
}

/// Pinned versions of the static assets referenced by the explorer page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryVersions {
    pub graphiql: String,
    pub subscriptions_transport: String,
    pub subscriptions_fetcher: String,
    pub react: String,
    pub fetch_polyfill: String,
}

impl Default for LibraryVersions {
    fn default() -> Self {
        Self {
            graphiql: DEFAULT_GRAPHIQL_VERSION.into(),
            subscriptions_transport: DEFAULT_SUBSCRIPTIONS_TRANSPORT_VERSION.into(),
            subscriptions_fetcher: DEFAULT_SUBSCRIPTIONS_FETCHER_VERSION.into(),
            react: DEFAULT_REACT_VERSION.into(),
            fetch_polyfill: DEFAULT_FETCH_POLYFILL_VERSION.into(),
        }
    }
}

/// Body of a POSTed operation, shared by the browser fetcher and the
/// upstream executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphQlRequest {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub variables: Value,
    #[serde(
        default,
        rename = "operationName",
        skip_serializing_if = "Option::is_none"
    )]
    pub operation_name: Option<String>,
}

impl From<GraphQlRequest> for RequestSnapshot {
    fn from(req: GraphQlRequest) -> Self {
        let variables = match req.variables {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            query_text: req.query,
            variables,
            operation_name: req.operation_name.unwrap_or_default(),
        }
    }
}
