//! CLI command implementations for Gatekeep.

pub mod keys;
pub mod policy;
pub mod token;
