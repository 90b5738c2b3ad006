use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Only SELECT queries are allowed")]
    NotSelect,

    #[error("Keyword '{0}' is not allowed")]
    ForbiddenKeyword(&'static str),

    #[error("Comments are not allowed in queries")]
    CommentNotAllowed,

    #[error("Multiple statements are not allowed")]
    MultipleStatements,

    #[error("Query is required")]
    EmptyQuery,

    #[error("Unknown practice database: {0}")]
    UnknownTarget(String),

    #[error("Database configuration error: {field} is not set for database \"{target}\". Please check your environment and ensure {env_var} is configured.")]
    IncompleteProfile {
        target: String,
        field: &'static str,
        env_var: &'static str,
    },

    #[error("MySQL error: {0}")]
    Mysql(#[from] mysql::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EngineError>;
