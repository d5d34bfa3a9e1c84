//! Partition table model, allocation and construction

pub mod allocator;
pub mod identifiers;
pub mod layouts;
pub mod partition_types;
pub mod payload;
pub mod table;

pub use allocator::{allocate, PartitioningMode};
pub use identifiers::generate_identifiers;
pub use layouts::{base_template, new_custom_partition_table, new_partition_table};
pub use payload::{Btrfs, Filesystem, FsType, LogicalVolume, LvmVolumeGroup, Payload, Subvolume};
pub use table::{Mountable, Partition, PartitionTable, TableType};
