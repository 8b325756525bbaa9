use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Unknown table: {0}")]
    UnknownTable(String),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("SQL parse error: {0}")]
    SqlParse(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to replace table file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl StoreError {
    /// True for outcomes the lenient facade folds into "no rows": an unknown
    /// table or a statement the interpreter does not understand.
    pub fn is_unsupported(&self) -> bool {
        matches!(
            self,
            StoreError::UnknownTable(_)
                | StoreError::UnsupportedStatement(_)
                | StoreError::SqlParse(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
