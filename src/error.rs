use thiserror::Error;

/// An error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no such container: {0}")]
    NoSuchContainer(String),
    #[error("no such blob: {container}/{path}")]
    NoSuchBlob { container: String, path: String },
    #[error("could not serialize value to JSON: {0}")]
    Serialization(#[source] serde_json::Error),
    #[error("blob content is not valid JSON: {0}")]
    Deserialization(#[source] serde_json::Error),
    #[error("invalid storage configuration: {0}")]
    Config(String),
    #[error("{context}: {source}")]
    Backend {
        context: String,
        #[source]
        source: anyhow::Error,
    },
}

impl Error {
    /// Wraps a backend failure, keeping the original error as the source.
    pub fn forward_with_context(
        err: impl Into<anyhow::Error>,
        context: impl Into<String>,
    ) -> Self {
        Self::Backend {
            context: context.into(),
            source: err.into(),
        }
    }

    pub fn no_such_blob(container: impl Into<String>, path: impl Into<String>) -> Self {
        Self::NoSuchBlob {
            container: container.into(),
            path: path.into(),
        }
    }

    /// Whether this error reports a missing container or blob.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoSuchContainer(_) | Self::NoSuchBlob { .. })
    }
}

/// A result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
