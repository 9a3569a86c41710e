use std::path::PathBuf;

use thiserror::Error;

/// Errors returned by block device operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BlockError {
    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Failed to {action}: {message}")]
    Exec { action: String, message: String },

    #[error("Not an rbd device: {device}")]
    InvalidDevice { device: String },

    #[error("Failed to write rbd control file {}: {message}", path.display())]
    ControlFile { path: PathBuf, message: String },

    #[error("Failed to read rbd sys bus at {}: {message}", path.display())]
    SysBus { path: PathBuf, message: String },
}
