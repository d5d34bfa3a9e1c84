//! Shared helpers

pub mod datasize;
pub mod error;
pub mod paths;
