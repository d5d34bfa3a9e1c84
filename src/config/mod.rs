//! Customization documents, construction options and their checks

pub mod customization;
pub mod options;
pub mod policy;
pub mod validation;

pub use customization::PartitioningCustomization;
pub use options::{BootMode, CustomPartitionTableOptions};
pub use policy::{check_mountpoints_policy, check_partitioning_policy, PathPolicies, PathPolicy};
