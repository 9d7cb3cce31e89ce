#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to database: {0}")]
    ConnectionError(#[source] sqlx::Error),
    #[error("failed to run initial migration: {0}")]
    MigrationError(#[source] sqlx::migrate::MigrateError),
    #[error("failed to insert sample: {0}")]
    InsertError(#[source] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
