use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbdeskError {
    #[error("connection: {message}")]
    Connection { message: String },

    #[error("no connection: no database is open")]
    NoConnection,

    #[error("query: {message}")]
    Query { message: String },

    #[error("import: {file}: {message} ({chunks_committed} chunks committed)")]
    Import {
        file: String,
        message: String,
        chunks_committed: usize,
    },

    #[error("export: {table} -> {file}: {message}")]
    Export {
        table: String,
        file: String,
        message: String,
    },

    #[error("config: {message}")]
    Config { message: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("format: {message}")]
    Format { message: String },
}

impl DbdeskError {
    /// Wrap an engine error raised while executing a statement.
    pub fn query(err: rusqlite::Error) -> Self {
        DbdeskError::Query {
            message: err.to_string(),
        }
    }
}
