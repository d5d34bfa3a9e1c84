//! Partition payloads: plain filesystems, LVM volume groups and btrfs volumes

use crate::utils::datasize::{align_up, MIB};
use crate::utils::error::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Filesystem types the engine knows how to lay out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsType {
    Ext4,
    Xfs,
    Vfat,
    Btrfs,
}

impl fmt::Display for FsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ext4 => write!(f, "ext4"),
            Self::Xfs => write!(f, "xfs"),
            Self::Vfat => write!(f, "vfat"),
            Self::Btrfs => write!(f, "btrfs"),
        }
    }
}

impl FromStr for FsType {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ext4" => Ok(Self::Ext4),
            "xfs" => Ok(Self::Xfs),
            "vfat" => Ok(Self::Vfat),
            "btrfs" => Ok(Self::Btrfs),
            other => Err(LayoutError::Configuration(format!(
                "unsupported filesystem type: {:?}",
                other
            ))),
        }
    }
}

/// A formatted filesystem and its fstab entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filesystem {
    #[serde(rename = "type")]
    pub fs_type: FsType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mountpoint: Option<String>,
    #[serde(default = "default_fstab_options")]
    pub fstab_options: String,
    #[serde(default)]
    pub fstab_freq: u64,
    #[serde(default)]
    pub fstab_passno: u64,
}

fn default_fstab_options() -> String {
    "defaults".to_string()
}

impl Filesystem {
    /// A filesystem mounted at `mountpoint` with default fstab fields
    pub fn new(fs_type: FsType, mountpoint: &str) -> Self {
        Filesystem {
            fs_type,
            uuid: None,
            label: None,
            mountpoint: Some(mountpoint.to_string()),
            fstab_options: default_fstab_options(),
            fstab_freq: 0,
            fstab_passno: 0,
        }
    }

    pub fn with_label(mut self, label: &str) -> Self {
        if !label.is_empty() {
            self.label = Some(label.to_string());
        }
        self
    }
}

/// A logical volume inside an LVM volume group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalVolume {
    pub name: String,
    pub size: u64,
    pub payload: Filesystem,
}

/// An LVM volume group occupying a whole partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LvmVolumeGroup {
    pub name: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default)]
    pub logical_volumes: Vec<LogicalVolume>,
}

/// Allocation granularity of logical volumes
pub const LVM_EXTENT_SIZE: u64 = 4 * MIB;

/// Space reserved on the physical volume for LVM metadata
pub const LVM_METADATA_SIZE: u64 = MIB;

pub const DEFAULT_VOLUME_GROUP_NAME: &str = "rootvg";

/// Derive a logical volume name from its mountpoint (`/var/log` -> `var_loglv`)
fn lv_name_for(mountpoint: &str) -> String {
    if mountpoint == "/" {
        return "rootlv".to_string();
    }
    format!("{}lv", mountpoint.trim_start_matches('/').replace('/', "_"))
}

impl LvmVolumeGroup {
    pub fn new(name: &str) -> Self {
        let name = if name.is_empty() {
            DEFAULT_VOLUME_GROUP_NAME
        } else {
            name
        };
        LvmVolumeGroup {
            name: name.to_string(),
            description: "created by disklayout".to_string(),
            uuid: None,
            logical_volumes: Vec::new(),
        }
    }

    fn has_logical_volume(&self, name: &str) -> bool {
        self.logical_volumes.iter().any(|lv| lv.name == name)
    }

    fn generate_lv_name(&self, mountpoint: &str) -> Result<String> {
        let base = lv_name_for(mountpoint);
        if !self.has_logical_volume(&base) {
            return Ok(base);
        }

        (0..100)
            .map(|i| format!("{}{:02}", base, i))
            .find(|candidate| !self.has_logical_volume(candidate))
            .ok_or_else(|| {
                LayoutError::Configuration(format!(
                    "could not create logical volume name for {} in volume group {}",
                    mountpoint, self.name
                ))
            })
    }

    /// Append a logical volume, rounding its size up to whole extents.
    ///
    /// An empty `name` is derived from the payload's mountpoint.
    pub fn create_logical_volume(
        &mut self,
        name: &str,
        size: u64,
        payload: Filesystem,
    ) -> Result<&mut LogicalVolume> {
        let name = if name.is_empty() {
            let mountpoint = payload.mountpoint.as_deref().unwrap_or_default();
            self.generate_lv_name(mountpoint)?
        } else if self.has_logical_volume(name) {
            return Err(LayoutError::Configuration(format!(
                "logical volume {} already exists in volume group {}",
                name, self.name
            )));
        } else {
            name.to_string()
        };

        let size = align_up(size, LVM_EXTENT_SIZE).ok_or(LayoutError::size_overflow(size))?;
        self.logical_volumes.push(LogicalVolume {
            name,
            size,
            payload,
        });
        let idx = self.logical_volumes.len() - 1;
        Ok(&mut self.logical_volumes[idx])
    }

    /// Bytes the physical volume needs to hold every logical volume
    pub fn required_size(&self) -> Result<u64> {
        self.logical_volumes
            .iter()
            .try_fold(LVM_METADATA_SIZE, |acc, lv| {
                align_up(lv.size, LVM_EXTENT_SIZE)
                    .and_then(|size| acc.checked_add(size))
                    .ok_or(LayoutError::size_overflow(lv.size))
            })
    }
}

/// A btrfs subvolume; all subvolumes share their volume's storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subvolume {
    pub name: String,
    pub mountpoint: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Only set on the primary (root) subvolume
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl Subvolume {
    pub fn fstab_options(&self) -> String {
        format!("subvol={}", self.name)
    }
}

/// A btrfs volume spanning one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Btrfs {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub subvolumes: Vec<Subvolume>,
}

impl Btrfs {
    /// Index of the subvolume that reports the volume's size: the first one mounted at `/`
    pub fn primary_subvolume(&self) -> Option<usize> {
        self.subvolumes.iter().position(|s| s.mountpoint == "/")
    }
}

/// What a partition contains
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    Filesystem(Filesystem),
    Lvm(LvmVolumeGroup),
    Btrfs(Btrfs),
}

impl Payload {
    /// Lower bound the payload places on its partition's size
    pub fn minimum_size(&self) -> Result<u64> {
        match self {
            Payload::Lvm(vg) => vg.required_size(),
            Payload::Filesystem(_) | Payload::Btrfs(_) => Ok(0),
        }
    }

    /// Every mountpoint provided by this payload, in declaration order
    pub fn mountpoints(&self) -> Vec<&str> {
        match self {
            Payload::Filesystem(fs) => fs.mountpoint.as_deref().into_iter().collect(),
            Payload::Lvm(vg) => vg
                .logical_volumes
                .iter()
                .filter_map(|lv| lv.payload.mountpoint.as_deref())
                .collect(),
            Payload::Btrfs(vol) => vol.subvolumes.iter().map(|s| s.mountpoint.as_str()).collect(),
        }
    }
}
