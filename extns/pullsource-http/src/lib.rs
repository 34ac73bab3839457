//! HTTP collaborators for the pull source.
//!
//! [client::HttpFetcher] issues the configured request with `${offset.<name>}` placeholders
//! resolved against the current offset, and [parser::JsonResponseParser] turns the JSON answer
//! into items using JSON pointers. [mapper::KvRecordMapper] turns those items into records.

pub use crate::client::HttpFetcher;
pub use crate::config::HttpSourceConfig;
pub use crate::mapper::KvRecordMapper;
pub use crate::parser::JsonResponseParser;

pub mod client;
pub mod config;
pub mod mapper;
pub mod parser;
pub mod template;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Failed with HTTP error - {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected status {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode response - {0}")]
    Decode(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}

impl From<Error> for pullsource_core::Error {
    fn from(value: Error) -> Self {
        match value {
            Error::Http(_) | Error::Status { .. } => {
                pullsource_core::Error::Transient(value.to_string())
            }
            Error::InvalidConfig(msg) => pullsource_core::Error::Config(msg),
            Error::Decode(msg) => pullsource_core::Error::Parse(msg),
            Error::Other(msg) => pullsource_core::Error::Other(msg),
        }
    }
}
