pub mod connection;
pub mod memory;
pub mod postgres;
pub mod sqlite;
pub mod subscription_repository;
pub mod timestamps;
pub mod user_repository;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("{0} already exists")]
    Duplicate(&'static str),
    #[error("malformed timestamp {value:?} in column {column}")]
    MalformedTimestamp { column: &'static str, value: String },
    #[error("malformed row: {0}")]
    Corrupt(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl StoreError {
    /// Collapses a sqlx error into `Duplicate` when the driver reports a
    /// unique-constraint violation, so all adapters report conflicts alike.
    pub fn on_insert(entity: &'static str, err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Duplicate(entity),
            _ => StoreError::Database(err),
        }
    }
}
