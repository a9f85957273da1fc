//! Commit identity for mergebot.
//!
//! Git hosts report commits by their hexadecimal object name. This crate
//! provides the validated `Sha` type used as the node key of every commit
//! graph and as the argument of every replay operation.

mod error;
pub mod hex;
mod sha;

pub use error::HashError;
pub use sha::{Sha, SHA1_HEX_LEN, SHA256_HEX_LEN};
