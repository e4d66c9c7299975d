use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum BiosubError {
    #[error("not a well formed package directory {path}: {reason}")]
    MalformedPackage { path: String, reason: String },

    #[error("md5sum sidecar problem: {0}")]
    Md5sumFile(String),

    #[error("invalid package kind: {0}")]
    InvalidKind(String),

    #[error("login failed: {0}")]
    Credentials(String),

    #[error("enum catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("transfer endpoint connection failed: {0}")]
    Connection(String),

    #[error("submission of {kind} rejected: {message}")]
    Submission { kind: String, message: String },

    #[error("archive request failed: {0}")]
    ApiHttp(String),

    #[error("archive returned status {status}: {message}")]
    ApiStatus { status: u16, message: String },

    #[error("not inside a submission workspace, run 'biosub init' first")]
    MissingWorkspace,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse config file: {0}")]
    ConfigParse(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
