//! disklayout - partition table construction and allocation for OS images

pub mod config;
pub mod disk;
pub mod utils;

pub use config::{CustomPartitionTableOptions, PartitioningCustomization};
pub use disk::PartitionTable;
pub use utils::error::LayoutError;
