//! Offset and size assignment for partition tables
//!
//! Partitions are laid out back to back on a 1 MiB grain after the table
//! header. The partition holding `/` is placed last and absorbs any space
//! left between the partitions and the requested table size; on GPT it also
//! gives up the bytes needed by the backup header at the end of the disk.

use crate::disk::payload::{Payload, LVM_EXTENT_SIZE};
use crate::disk::table::{Partition, PartitionTable};
use crate::utils::datasize::{align_up, MIB};
use crate::utils::error::{LayoutError, Result};
use crate::utils::paths::contains_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

/// Alignment of every partition start
pub const DEFAULT_GRAIN: u64 = MIB;

/// What to do when the requested table size cannot hold the declared minimums
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartitioningMode {
    /// Grow the table to the sum of the minimums
    #[default]
    Grow,
    /// Refuse with a geometry error
    Strict,
}

impl fmt::Display for PartitioningMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grow => write!(f, "grow"),
            Self::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for PartitioningMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "grow" => Ok(Self::Grow),
            "strict" => Ok(Self::Strict),
            other => Err(LayoutError::Configuration(format!(
                "invalid partitioning mode: {}",
                other
            ))),
        }
    }
}

/// Minimum extent of a partition, including what its payload needs
fn minimum_extent(partition: &Partition) -> Result<u64> {
    let payload_min = match &partition.payload {
        Some(payload) => payload.minimum_size()?,
        None => 0,
    };
    let size = partition.size.max(payload_min);
    align_up(size, DEFAULT_GRAIN).ok_or(LayoutError::size_overflow(size))
}

/// Assign start offsets and final sizes, and fix the table's total size.
///
/// `minimum_size` of zero means "as small as possible". On error the table
/// is left untouched.
pub fn allocate(pt: &mut PartitionTable, minimum_size: u64, mode: PartitioningMode) -> Result<()> {
    if pt.finalized {
        return Err(LayoutError::AlreadyFinalized);
    }

    let sector = pt.sector_size;
    if sector == 0 || !sector.is_power_of_two() || DEFAULT_GRAIN % sector != 0 {
        return Err(LayoutError::InvalidSectorSize(sector));
    }

    let header = pt.header_size();
    let footer = pt.footer_size();

    // the partition holding / goes last so it can grow
    let mut order: Vec<usize> = (0..pt.partitions.len()).collect();
    if let Some(root) = pt.root_partition_index() {
        order.retain(|&idx| idx != root);
        order.push(root);
    }

    let wanted = minimum_size.max(pt.size);
    let overflow = || LayoutError::size_overflow(wanted);

    let mut start = align_up(header, DEFAULT_GRAIN).ok_or_else(overflow)?;
    let mut extents = vec![(0u64, 0u64); pt.partitions.len()];
    for &idx in &order {
        let size = minimum_extent(&pt.partitions[idx])?;
        extents[idx] = (start, size);
        start = start.checked_add(size).ok_or_else(overflow)?;
    }

    let natural = start
        .checked_add(footer)
        .and_then(|end| align_up(end, DEFAULT_GRAIN))
        .ok_or_else(overflow)?;
    let requested = align_up(wanted, DEFAULT_GRAIN).ok_or_else(overflow)?;

    if requested != 0 && requested < natural && mode == PartitioningMode::Strict {
        return Err(LayoutError::Geometry {
            required: natural,
            requested: wanted,
        });
    }
    let total = natural.max(requested);

    debug!(
        "Laying out {} partitions: header {} bytes, footer {} bytes, table {} bytes",
        pt.partitions.len(),
        header,
        footer,
        total
    );

    let mut rank = vec![0usize; pt.partitions.len()];
    for (pos, &idx) in order.iter().enumerate() {
        rank[idx] = pos;
    }

    let mut partitions: Vec<(usize, Partition)> = pt.partitions.drain(..).enumerate().collect();
    partitions.sort_by_key(|(idx, _)| rank[*idx]);

    let count = partitions.len();
    pt.partitions = partitions
        .into_iter()
        .enumerate()
        .map(|(pos, (idx, mut partition))| {
            let (start, size) = extents[idx];
            partition.start = start;
            partition.size = if pos + 1 == count {
                total - start - footer
            } else {
                size
            };
            debug!(
                "Partition {}: start={} size={} type={}",
                pos + 1,
                partition.start,
                partition.size,
                partition.part_type
            );
            partition
        })
        .collect();

    for partition in &mut pt.partitions {
        let size = partition.size;
        if let Some(Payload::Btrfs(volume)) = partition.payload.as_mut() {
            if let Some(primary) = volume.primary_subvolume() {
                volume.subvolumes[primary].size = Some(size);
            }
        }
    }

    pt.size = total;
    pt.finalized = true;

    info!(
        "Allocated {} table: {} partitions, {} bytes",
        pt.table_type,
        pt.partitions.len(),
        pt.size
    );
    Ok(())
}

/// Grow mountables so each can hold the directories it contains.
///
/// Every directory is charged to the mountable with the deepest mountpoint
/// containing it; charges on one mountable add up.
pub fn ensure_directory_sizes(pt: &mut PartitionTable, required: &BTreeMap<String, u64>) -> Result<()> {
    let mountpoints: Vec<String> = pt
        .mountables()
        .iter()
        .map(|m| m.mountpoint().to_string())
        .collect();

    let mut charges: BTreeMap<String, u64> = BTreeMap::new();
    for (dir, size) in required {
        let owner = mountpoints
            .iter()
            .filter(|mp| contains_path(mp, dir))
            .max_by_key(|mp| mp.len());
        match owner {
            Some(mp) => {
                let charge = charges.entry(mp.clone()).or_default();
                *charge = charge
                    .checked_add(*size)
                    .ok_or(LayoutError::size_overflow(*size))?;
            }
            None => debug!("No mountable holds {}, ignoring its size requirement", dir),
        }
    }

    ensure_mountpoint_sizes(pt, &charges)
}

/// Grow each listed mountpoint to at least the given size.
///
/// Plain filesystems grow their partition, logical volumes grow in whole
/// extents, and subvolume requirements are summed onto their btrfs partition.
pub fn ensure_mountpoint_sizes(pt: &mut PartitionTable, sizes: &BTreeMap<String, u64>) -> Result<()> {
    for partition in &mut pt.partitions {
        let Partition { size, payload, .. } = partition;
        match payload {
            Some(Payload::Filesystem(fs)) => {
                if let Some(min) = fs.mountpoint.as_ref().and_then(|mp| sizes.get(mp)) {
                    *size = (*size).max(*min);
                }
            }
            Some(Payload::Lvm(vg)) => {
                for lv in &mut vg.logical_volumes {
                    let min = lv.payload.mountpoint.as_ref().and_then(|mp| sizes.get(mp));
                    if let Some(&min) = min {
                        let rounded = align_up(min, LVM_EXTENT_SIZE)
                            .ok_or(LayoutError::size_overflow(min))?;
                        lv.size = lv.size.max(rounded);
                    }
                }
            }
            Some(Payload::Btrfs(volume)) => {
                let total = volume
                    .subvolumes
                    .iter()
                    .filter_map(|s| sizes.get(&s.mountpoint))
                    .try_fold(0u64, |acc, min| {
                        acc.checked_add(*min).ok_or(LayoutError::size_overflow(*min))
                    })?;
                *size = (*size).max(total);
            }
            None => {}
        }
    }
    Ok(())
}
