//! Address-bar state as the server reads it.
//!
//! The bootstrap script in the rendered page keeps the editor contents in the
//! URL query string. GET requests carry that same query string, so the server
//! parses it here with the browser's decoding rules: reserved names become a
//! [`RequestSnapshot`], everything else is forwarded to the engine.

use std::borrow::Cow;

use percent_encoding::percent_decode_str;
use serde_json::{Map, Value};
use tracing::warn;

use crate::types::RequestSnapshot;

pub const QUERY_PARAM: &str = "query";
pub const VARIABLES_PARAM: &str = "variables";
pub const OPERATION_NAME_PARAM: &str = "operationName";

/// Parameter names that carry editor state. Everything else passes through
/// to the execution endpoint.
pub const RESERVED_PARAMS: [&str; 3] = [QUERY_PARAM, VARIABLES_PARAM, OPERATION_NAME_PARAM];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_PARAMS.contains(&name)
}

/// Insertion-ordered parameter set. Setting an existing name replaces its
/// value in place, matching property assignment on a JS object.
///
/// Entries that do not decode are kept verbatim, unless they would have
/// named a reserved parameter, so a malformed pass-through value still
/// reaches the engine byte for byte.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlParameters {
    entries: Vec<(String, String)>,
    verbatim: Vec<String>,
}

impl UrlParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a query string with or without its leading `?`.
    ///
    /// Entries without `=` are ignored.
    pub fn parse(search: &str) -> Self {
        let search = search.strip_prefix('?').unwrap_or(search);
        let mut params = Self::new();

        for entry in search.split('&') {
            let Some((raw_key, raw_value)) = entry.split_once('=') else {
                continue;
            };
            let key = decode_component(raw_key);
            match (key.as_deref(), decode_component(raw_value)) {
                (Some(key), Some(value)) => params.set(key, value),
                (Some(key), None) if is_reserved(key) => {
                    warn!(entry, "dropping undecodable editor parameter")
                }
                _ => {
                    warn!(entry, "keeping undecodable query parameter verbatim");
                    params.verbatim.push(entry.to_string());
                }
            }
        }

        params
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Raw `key=value` entries that failed to decode, in arrival order.
    pub fn verbatim(&self) -> impl Iterator<Item = &str> {
        self.verbatim.iter().map(String::as_str)
    }

    /// The parameters that are forwarded to the execution endpoint.
    pub fn pass_through(&self) -> Self {
        Self {
            entries: self
                .entries
                .iter()
                .filter(|(key, _)| !is_reserved(key))
                .cloned()
                .collect(),
            verbatim: self.verbatim.clone(),
        }
    }

    /// Reads the reserved parameters into a snapshot. Variables that are not
    /// a JSON object are ignored.
    pub fn to_snapshot(&self) -> RequestSnapshot {
        let variables = match self.get(VARIABLES_PARAM).filter(|v| !v.trim().is_empty()) {
            None => Map::new(),
            Some(text) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Object(map)) => map,
                Ok(_) => {
                    warn!("ignoring non-object variables parameter");
                    Map::new()
                }
                Err(e) => {
                    warn!(error = %e, "ignoring unparseable variables parameter");
                    Map::new()
                }
            },
        };

        RequestSnapshot {
            query_text: self.get(QUERY_PARAM).unwrap_or_default().to_string(),
            variables,
            operation_name: self.get(OPERATION_NAME_PARAM).unwrap_or_default().to_string(),
        }
    }
}

/// True when the raw query string carries `name` as a bare flag or as a key.
pub fn has_flag(search: &str, name: &str) -> bool {
    let search = search.strip_prefix('?').unwrap_or(search);
    search.split('&').any(|entry| {
        let key = entry.split_once('=').map_or(entry, |(key, _)| key);
        decode_component(key).as_deref() == Some(name)
    })
}

/// `decodeURIComponent`: `+` stays literal, and a `%` not followed by two hex
/// digits is an error rather than passed through.
pub fn decode_component(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let pair = bytes.get(i + 1..i + 3)?;
            if !pair.iter().all(u8::is_ascii_hexdigit) {
                return None;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    percent_decode_str(input)
        .decode_utf8()
        .ok()
        .map(Cow::into_owned)
}

/// Body of an execution response, parsed leniently.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    Json(Value),
    /// Not JSON, e.g. an HTML error page from a proxy.
    Raw(String),
}

impl FetchOutcome {
    pub fn from_body(text: &str) -> Self {
        match serde_json::from_str(text) {
            Ok(value) => Self::Json(value),
            Err(_) => Self::Raw(text.to_string()),
        }
    }
}
