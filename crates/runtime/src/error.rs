use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("tool error: {0}")]
    Tool(String),

    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
