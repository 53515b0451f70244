use thiserror::Error;
use tonic::Status;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::InvalidInput(errors.to_string())
    }
}

impl From<AppError> for Status {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Database(e) => Status::internal(format!("Database error: {}", e)),
            AppError::Migration(e) => Status::internal(format!("Migration error: {}", e)),
            AppError::InvalidInput(msg) => Status::invalid_argument(msg),
            AppError::Internal(msg) => Status::internal(msg),
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
