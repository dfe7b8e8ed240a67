use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BookdiffError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Judge error: {0}")]
    Judge(#[from] crate::judge::JudgeError),

    #[error("Comparison error: {0}")]
    Compare(#[from] crate::compare::CompareError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("API key environment variable '{var_name}' is not set")]
    MissingApiKey { var_name: String },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Image not found: {0}")]
    NotFound(String),

    #[error("Invalid path reference '{path_ref}': {reason}")]
    InvalidPathRef { path_ref: String, reason: String },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Folder scan failed for '{path}': {source}")]
    ScanFailed {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

pub type Result<T> = std::result::Result<T, BookdiffError>;
