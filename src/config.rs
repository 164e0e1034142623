use anyhow::Context;

use crate::types::{EndpointConfig, LibraryVersions};

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    pub upstream_url: String,
    pub upstream_timeout_ms: u64,
    pub page_enabled: bool,
    /// `None` when neither endpoint variable is set.
    pub endpoints: Option<EndpointConfig>,
    pub versions: LibraryVersions,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("EXPLORER_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:4000".into());
        let upstream_url =
            lookup("EXPLORER_UPSTREAM_URL").context("EXPLORER_UPSTREAM_URL must be set")?;
        let upstream_timeout_ms = lookup("UPSTREAM_TIMEOUT_MS")
            .unwrap_or_else(|| "30000".into())
            .parse()
            .context("UPSTREAM_TIMEOUT_MS must be a number")?;
        let page_enabled = lookup("EXPLORER_PAGE_ENABLED")
            .unwrap_or_else(|| "true".into())
            .parse()
            .context("EXPLORER_PAGE_ENABLED must be true or false")?;

        let endpoint = lookup("EXPLORER_ENDPOINT");
        let subscriptions_endpoint = lookup("EXPLORER_SUBSCRIPTIONS_ENDPOINT");
        let endpoints = match (endpoint, subscriptions_endpoint) {
            (None, None) => None,
            (endpoint, subscriptions_endpoint) => Some(EndpointConfig {
                endpoint: endpoint.unwrap_or_default(),
                subscriptions_endpoint: subscriptions_endpoint.unwrap_or_default(),
            }),
        };

        let defaults = LibraryVersions::default();
        let versions = LibraryVersions {
            graphiql: lookup("GRAPHIQL_VERSION").unwrap_or(defaults.graphiql),
            subscriptions_transport: lookup("SUBSCRIPTIONS_TRANSPORT_VERSION")
                .unwrap_or(defaults.subscriptions_transport),
            subscriptions_fetcher: lookup("SUBSCRIPTIONS_FETCHER_VERSION")
                .unwrap_or(defaults.subscriptions_fetcher),
            react: lookup("REACT_VERSION").unwrap_or(defaults.react),
            fetch_polyfill: lookup("FETCH_POLYFILL_VERSION").unwrap_or(defaults.fetch_polyfill),
        };

        Ok(Self {
            bind_addr,
            upstream_url,
            upstream_timeout_ms,
            page_enabled,
            endpoints,
            versions,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply() {
        let cfg = config(&[("EXPLORER_UPSTREAM_URL", "http://engine/graphql")]).unwrap();
        assert_eq!(cfg.bind_addr, "127.0.0.1:4000");
        assert_eq!(cfg.upstream_timeout_ms, 30000);
        assert!(cfg.page_enabled);
        assert!(cfg.endpoints.is_none());
        assert_eq!(cfg.versions, LibraryVersions::default());
    }

    #[test]
    fn upstream_is_required() {
        let err = config(&[]).unwrap_err();
        assert!(err.to_string().contains("EXPLORER_UPSTREAM_URL"));
    }

    #[test]
    fn one_endpoint_creates_config() {
        let cfg = config(&[
            ("EXPLORER_UPSTREAM_URL", "http://engine/graphql"),
            ("EXPLORER_SUBSCRIPTIONS_ENDPOINT", "ws://localhost/subscriptions"),
        ])
        .unwrap();
        assert_eq!(
            cfg.endpoints,
            Some(EndpointConfig {
                endpoint: String::new(),
                subscriptions_endpoint: "ws://localhost/subscriptions".into(),
            })
        );
    }

    #[test]
    fn version_overrides() {
        let cfg = config(&[
            ("EXPLORER_UPSTREAM_URL", "http://engine/graphql"),
            ("GRAPHIQL_VERSION", "0.12.0"),
        ])
        .unwrap();
        assert_eq!(cfg.versions.graphiql, "0.12.0");
        assert_eq!(cfg.versions.subscriptions_transport, "0.8.2");
    }

    #[test]
    fn rejects_bad_numbers() {
        let err = config(&[
            ("EXPLORER_UPSTREAM_URL", "http://engine/graphql"),
            ("UPSTREAM_TIMEOUT_MS", "soon"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("UPSTREAM_TIMEOUT_MS"));
    }
}
