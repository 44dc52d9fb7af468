use std::path::PathBuf;

/// Errors from the copy, backup and config operations.
///
/// Path discovery and role scanning never fail; they report absence instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("source role folder does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("source and target are the same role folder: {0}")]
    SameRole(PathBuf),

    #[error("target parent folder does not exist: {0}")]
    TargetParentMissing(PathBuf),

    #[error("invalid role folder name: {0:?}")]
    InvalidRoleName(String),

    #[error("backup not found: {0}")]
    BackupNotFound(String),

    #[error("invalid backup name: {0:?}")]
    InvalidBackupName(String),

    #[error("unknown config key: {0}")]
    UnknownConfigKey(String),
}

pub type Result<T> = std::result::Result<T, Error>;
