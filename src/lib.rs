use thiserror::Error;

pub type Result<T> = std::result::Result<T, SiteQaError>;

#[derive(Error, Debug)]
pub enum SiteQaError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Content directory error: {0}")]
    ContentNotFound(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("Provider authentication failed: {0}")]
    ProviderAuth(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SiteQaError {
    /// Whether this error should terminate an interactive session.
    ///
    /// Only credential failures are unrecoverable mid-session; transient
    /// provider and index errors are reported and the loop continues.
    #[inline]
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self, SiteQaError::ProviderAuth(_))
    }
}

pub mod advisor;
pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod extractor;
pub mod qa;
