//! Tool host error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Storage(#[from] storage::Error),

    #[error(transparent)]
    Policy(#[from] policy::Error),

    #[error(transparent)]
    Mcp(#[from] mcp::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
