//! Partition table model and the read-only queries downstream stages rely on

use crate::disk::payload::{Btrfs, Filesystem, FsType, LogicalVolume, LvmVolumeGroup, Payload, Subvolume};
use crate::utils::datasize::align_up;
use crate::utils::error::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_SECTOR_SIZE: u64 = 512;

/// GPT reserves room for at least this many partition entries
const GPT_MIN_PARTITION_ENTRIES: u64 = 128;
const GPT_PARTITION_ENTRY_SIZE: u64 = 128;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    #[default]
    Gpt,
    Dos,
}

impl fmt::Display for TableType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gpt => write!(f, "gpt"),
            Self::Dos => write!(f, "dos"),
        }
    }
}

impl FromStr for TableType {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "gpt" => Ok(Self::Gpt),
            "dos" => Ok(Self::Dos),
            other => Err(LayoutError::Configuration(format!(
                "invalid partition table type: {}",
                other
            ))),
        }
    }
}

/// A single partition: a byte range, a type code and an optional payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partition {
    #[serde(default)]
    pub start: u64,
    /// Declared minimum before allocation, final extent afterwards
    pub size: u64,
    #[serde(rename = "type")]
    pub part_type: String,
    #[serde(default)]
    pub bootable: bool,
    /// Per-partition GUID; always `None` on dos tables
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl Partition {
    pub fn new(size: u64, part_type: &str) -> Self {
        Partition {
            start: 0,
            size,
            part_type: part_type.to_string(),
            bootable: false,
            uuid: None,
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.uuid = Some(uuid.to_string());
        self
    }

    pub fn bootable(mut self) -> Self {
        self.bootable = true;
        self
    }

    pub fn end(&self) -> u64 {
        self.start + self.size
    }

    pub fn mountpoints(&self) -> Vec<&str> {
        self.payload.as_ref().map(Payload::mountpoints).unwrap_or_default()
    }

    pub fn contains_mountpoint(&self, mountpoint: &str) -> bool {
        self.mountpoints().contains(&mountpoint)
    }
}

/// Something that gets mounted: a plain filesystem, a logical volume or a subvolume
#[derive(Debug, Clone, Copy)]
pub enum Mountable<'a> {
    Filesystem {
        partition: &'a Partition,
        filesystem: &'a Filesystem,
    },
    LogicalVolume {
        partition: &'a Partition,
        group: &'a LvmVolumeGroup,
        volume: &'a LogicalVolume,
    },
    Subvolume {
        partition: &'a Partition,
        volume: &'a Btrfs,
        subvolume: &'a Subvolume,
    },
}

impl<'a> Mountable<'a> {
    pub fn mountpoint(&self) -> &'a str {
        match *self {
            Mountable::Filesystem { filesystem, .. } => {
                filesystem.mountpoint.as_deref().unwrap_or_default()
            }
            Mountable::LogicalVolume { volume, .. } => {
                volume.payload.mountpoint.as_deref().unwrap_or_default()
            }
            Mountable::Subvolume { subvolume, .. } => &subvolume.mountpoint,
        }
    }

    /// Bytes allocated to this mountable
    pub fn size(&self) -> u64 {
        match *self {
            Mountable::Filesystem { partition, .. } => partition.size,
            Mountable::LogicalVolume { volume, .. } => volume.size,
            Mountable::Subvolume {
                partition,
                subvolume,
                ..
            } => subvolume.size.unwrap_or(partition.size),
        }
    }

    /// Filesystem identifier used to reference the mountable in fstab and on the kernel command line
    pub fn uuid(&self) -> Option<&'a str> {
        match *self {
            Mountable::Filesystem { filesystem, .. } => filesystem.uuid.as_deref(),
            Mountable::LogicalVolume { volume, .. } => volume.payload.uuid.as_deref(),
            Mountable::Subvolume {
                volume, subvolume, ..
            } => subvolume.uuid.as_deref().or(volume.uuid.as_deref()),
        }
    }

    pub fn fs_type(&self) -> FsType {
        match *self {
            Mountable::Filesystem { filesystem, .. } => filesystem.fs_type,
            Mountable::LogicalVolume { volume, .. } => volume.payload.fs_type,
            Mountable::Subvolume { .. } => FsType::Btrfs,
        }
    }
}

/// An ordered partition table, owned exclusively by one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionTable {
    #[serde(rename = "type")]
    pub table_type: TableType,
    #[serde(default)]
    pub size: u64,
    #[serde(default = "default_sector_size")]
    pub sector_size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub partitions: Vec<Partition>,
    #[serde(skip)]
    pub(crate) finalized: bool,
}

fn default_sector_size() -> u64 {
    DEFAULT_SECTOR_SIZE
}

impl PartitionTable {
    pub fn new(table_type: TableType) -> Self {
        PartitionTable {
            table_type,
            size: 0,
            sector_size: DEFAULT_SECTOR_SIZE,
            uuid: None,
            partitions: Vec::new(),
            finalized: false,
        }
    }

    pub fn with_uuid(mut self, uuid: &str) -> Self {
        self.uuid = Some(uuid.to_string());
        self
    }

    pub fn with_partition(mut self, partition: Partition) -> Self {
        self.partitions.push(partition);
        self
    }

    /// Deep copy of a shared template, ready to be allocated again
    pub fn instantiate(&self) -> Self {
        PartitionTable {
            finalized: false,
            ..self.clone()
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Bytes reserved at the start of the disk: the MBR/protective MBR sector
    /// plus, for GPT, the partition entry array padded to whole sectors.
    pub fn header_size(&self) -> u64 {
        let header = self.sector_size;
        match self.table_type {
            TableType::Dos => header,
            TableType::Gpt => {
                let entries = (self.partitions.len() as u64).max(GPT_MIN_PARTITION_ENTRIES);
                let array = entries * GPT_PARTITION_ENTRY_SIZE;
                header + align_up(array, self.sector_size).unwrap_or(array)
            }
        }
    }

    /// Bytes reserved at the end of the disk for the backup GPT
    pub fn footer_size(&self) -> u64 {
        match self.table_type {
            TableType::Dos => 0,
            TableType::Gpt => self.header_size(),
        }
    }

    /// Every mountable in on-disk order, payload entries in declaration order
    pub fn mountables(&self) -> Vec<Mountable<'_>> {
        let mut out = Vec::new();
        for partition in &self.partitions {
            match &partition.payload {
                Some(Payload::Filesystem(filesystem)) => {
                    if filesystem.mountpoint.is_some() {
                        out.push(Mountable::Filesystem {
                            partition,
                            filesystem,
                        });
                    }
                }
                Some(Payload::Lvm(group)) => {
                    for volume in &group.logical_volumes {
                        if volume.payload.mountpoint.is_some() {
                            out.push(Mountable::LogicalVolume {
                                partition,
                                group,
                                volume,
                            });
                        }
                    }
                }
                Some(Payload::Btrfs(volume)) => {
                    for subvolume in &volume.subvolumes {
                        out.push(Mountable::Subvolume {
                            partition,
                            volume,
                            subvolume,
                        });
                    }
                }
                None => {}
            }
        }
        out
    }

    pub fn find_mountpoint(&self, mountpoint: &str) -> Option<Mountable<'_>> {
        self.mountables()
            .into_iter()
            .find(|m| m.mountpoint() == mountpoint)
    }

    /// Index of the partition that holds `/`
    pub fn root_partition_index(&self) -> Option<usize> {
        self.partitions.iter().position(|p| p.contains_mountpoint("/"))
    }

    /// Size allocated to `mountpoint`
    pub fn mountpoint_size(&self, mountpoint: &str) -> Result<u64> {
        self.find_mountpoint(mountpoint)
            .map(|m| m.size())
            .ok_or_else(|| LayoutError::MountpointNotFound(mountpoint.to_string()))
    }

    /// Host packages needed at build time to create this table's volumes and filesystems
    pub fn build_packages(&self) -> Vec<&'static str> {
        let mut lvm = false;
        let mut btrfs = false;
        let mut fs_types = Vec::new();

        for partition in &self.partitions {
            match &partition.payload {
                Some(Payload::Filesystem(fs)) => fs_types.push(fs.fs_type),
                Some(Payload::Lvm(vg)) => {
                    lvm = true;
                    fs_types.extend(vg.logical_volumes.iter().map(|lv| lv.payload.fs_type));
                }
                Some(Payload::Btrfs(_)) => btrfs = true,
                None => {}
            }
        }
        btrfs |= fs_types.contains(&FsType::Btrfs);

        let mut packages = Vec::new();
        if lvm {
            packages.push("lvm2");
        }
        if btrfs {
            packages.push("btrfs-progs");
        }
        if fs_types.contains(&FsType::Xfs) {
            packages.push("xfsprogs");
        }
        if fs_types.contains(&FsType::Vfat) {
            packages.push("dosfstools");
        }
        if fs_types.contains(&FsType::Ext4) {
            packages.push("e2fsprogs");
        }
        packages
    }

    /// Kernel command-line options that locate the root filesystem
    pub fn kernel_options(&self) -> Result<Vec<String>> {
        let root = self.find_mountpoint("/").ok_or(LayoutError::MissingRoot)?;
        let uuid = root
            .uuid()
            .ok_or_else(|| LayoutError::MissingIdentifier("root filesystem".to_string()))?;

        let mut options = vec![format!("root=UUID={}", uuid)];
        match root {
            Mountable::Subvolume { subvolume, .. } => {
                options.push(format!("rootflags=subvol={}", subvolume.name));
            }
            Mountable::LogicalVolume { group, volume, .. } => {
                options.push(format!("rd.lvm.lv={}/{}", group.name, volume.name));
            }
            Mountable::Filesystem { .. } => {}
        }
        Ok(options)
    }

    /// Mountpoint to filesystem identifier, for every mountable that has one
    pub fn partition_map(&self) -> BTreeMap<String, String> {
        self.mountables()
            .into_iter()
            .filter_map(|m| m.uuid().map(|uuid| (m.mountpoint().to_string(), uuid.to_string())))
            .collect()
    }
}
