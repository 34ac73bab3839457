use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Fetching from the upstream source failed. The host is expected to retry the poll.
    #[error("Transient Error - {0}")]
    Transient(String),

    #[error("Parse Error - {0}")]
    Parse(String),

    #[error("Config Error - {0}")]
    Config(String),

    #[error("Checkpoint Error - {0}")]
    Checkpoint(String),

    #[error("Poll cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether the host should retry the failed operation instead of giving up on the task.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::Transient(_))
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Error::Other(value)
    }
}
