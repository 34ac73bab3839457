//! Settings of the HTTP collaborators. Keys owned by the core are ignored here.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Method;

use crate::{Error, Result};

pub const REQUEST_URL: &str = "http.request.url";
pub const REQUEST_METHOD: &str = "http.request.method";
pub const REQUEST_HEADERS: &str = "http.request.headers";
pub const REQUEST_PARAMS: &str = "http.request.params";
pub const REQUEST_BODY: &str = "http.request.body";
pub const CLIENT_TIMEOUT_MILLIS: &str = "http.client.timeout.millis";
pub const RESPONSE_LIST_POINTER: &str = "http.response.list.pointer";
pub const RESPONSE_KEY_POINTER: &str = "http.response.record.key.pointer";
pub const RESPONSE_TIMESTAMP_POINTER: &str = "http.response.record.timestamp.pointer";
pub const RESPONSE_OFFSET_POINTER: &str = "http.response.record.offset.pointer";

const DEFAULT_CLIENT_TIMEOUT_MILLIS: u64 = 10_000;

/// Request template. Every string may carry `${offset.<name>}` placeholders.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestConfig {
    pub url: String,
    pub method: Method,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
    pub body: Option<String>,
}

/// JSON pointers locating the items of a response and their fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResponseConfig {
    /// Where the list of items is. Empty points at the document root.
    pub list_pointer: String,
    pub key_pointer: Option<String>,
    pub timestamp_pointer: Option<String>,
    /// Extra offset properties, `(name, pointer)`.
    pub offset_pointers: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpSourceConfig {
    pub request: RequestConfig,
    pub timeout: Duration,
    pub response: ResponseConfig,
}

impl HttpSourceConfig {
    pub fn load(
        settings: impl IntoIterator<Item = (impl Into<String>, impl Into<String>)>,
    ) -> Result<Self> {
        let settings: HashMap<String, String> = settings
            .into_iter()
            .map(|(key, val)| (key.into(), val.into()))
            .collect();
        let get = |key: &str| {
            settings
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
        };

        let url = get(REQUEST_URL)
            .ok_or_else(|| Error::InvalidConfig(format!("{REQUEST_URL} is required")))?
            .to_string();

        let method = match get(REQUEST_METHOD) {
            Some(method) => Method::from_bytes(method.to_uppercase().as_bytes())
                .map_err(|e| Error::InvalidConfig(format!("{REQUEST_METHOD}: {e}")))?,
            None => Method::GET,
        };

        let timeout = match get(CLIENT_TIMEOUT_MILLIS) {
            Some(millis) => millis.parse::<u64>().map_err(|e| {
                Error::InvalidConfig(format!("{CLIENT_TIMEOUT_MILLIS}: {millis:?}: {e}"))
            })?,
            None => DEFAULT_CLIENT_TIMEOUT_MILLIS,
        };

        let list_pointer = match get(RESPONSE_LIST_POINTER) {
            Some("/") | None => String::new(),
            Some(pointer) => pointer.to_string(),
        };

        Ok(HttpSourceConfig {
            request: RequestConfig {
                url,
                method,
                headers: pairs(get(REQUEST_HEADERS), ',', ':', REQUEST_HEADERS)?,
                params: pairs(get(REQUEST_PARAMS), '&', '=', REQUEST_PARAMS)?,
                body: get(REQUEST_BODY).map(ToString::to_string),
            },
            timeout: Duration::from_millis(timeout),
            response: ResponseConfig {
                list_pointer,
                key_pointer: get(RESPONSE_KEY_POINTER).map(ToString::to_string),
                timestamp_pointer: get(RESPONSE_TIMESTAMP_POINTER).map(ToString::to_string),
                offset_pointers: pairs(
                    get(RESPONSE_OFFSET_POINTER),
                    ',',
                    '=',
                    RESPONSE_OFFSET_POINTER,
                )?,
            },
        })
    }
}

/// Splits `a<kv>1<sep>b<kv>2` into pairs. Only the first `kv` splits an entry, so values may
/// contain it.
fn pairs(raw: Option<&str>, sep: char, kv: char, key: &str) -> Result<Vec<(String, String)>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(sep)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            entry
                .split_once(kv)
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .filter(|(name, _)| !name.is_empty())
                .ok_or_else(|| {
                    Error::InvalidConfig(format!("{key}: expected name{kv}value, got {entry:?}"))
                })
        })
        .collect()
}
