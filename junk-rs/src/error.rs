use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum JunkError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt store {path:?}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("Incompatible store version in {path:?}: found {found}, expected {expected}")]
    IncompatibleVersion {
        path: PathBuf,
        found: u32,
        expected: u32,
    },

    #[error("Store already exists: {0:?}")]
    AlreadyExists(PathBuf),

    #[error("Store is locked by another filter: {0:?}")]
    Locked(PathBuf),

    #[error("Cannot untrain: {0}")]
    Untrain(String),

    #[error("Encoding error: {0}")]
    Encode(#[from] bincode::Error),
}

pub type Result<T> = std::result::Result<T, JunkError>;
