use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("invalid row: {0}")]
    InvalidRow(String),
}

/// The only failure a dashboard request can surface. The underlying cause is
/// logged where it is caught, never returned alongside partial results.
#[derive(Error, Debug)]
pub enum DashboardError {
    #[error("dashboard data is temporarily unavailable")]
    Unavailable,
}
