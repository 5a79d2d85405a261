//! Host-level errors.
//!
//! Data-quality problems in the stubs are never errors; they become
//! [`crate::diagnostics::Diagnostic`]s.  This type covers the failures the
//! host has to handle: unreadable input, invalid configuration, a corrupt
//! cache, and queries for things the database does not contain.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to walk stub directory {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("invalid config {path}: {source}")]
    Config {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid PHP version `{0}`")]
    InvalidPhpVersion(String),

    #[error("cache file {path} is unreadable: {source}")]
    CacheCorrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize symbol database: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid type `{text}`: {source}")]
    InvalidType {
        text: String,
        #[source]
        source: crate::type_expr::TypeSyntaxError,
    },

    #[error("unknown symbol `{0}`")]
    UnknownSymbol(String),

    #[error(transparent)]
    Eval(#[from] crate::evaluator::EvalError),
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
