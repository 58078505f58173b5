//! Statement policy for the SQL tools.
//!
//! Core principle: **the tool host runs caller SQL verbatim unless a policy
//! says otherwise.** [`Policy::passthrough`] (the default) allows every
//! statement; a TOML policy file can narrow each tool to the statement
//! families it is meant for and reject multi-statement input.

mod error;
mod policy;
mod statement;

pub use error::{Error, Result};
pub use policy::{AllowRules, Decision, DenyRules, Policy};
pub use statement::{StatementKind, StatementRequest, statement_count};
