//! Errors shared by the infrastructure crates

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Schema migration failed: {0}")]
    Migration(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;
