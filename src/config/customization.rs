//! User partitioning customizations (JSON or TOML)

use crate::disk::payload::FsType;
use crate::utils::datasize::{self, is_zero};
use crate::utils::error::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Top-level partitioning customization document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitioningCustomization {
    /// Minimum size of the whole disk image
    #[serde(default, deserialize_with = "datasize::deserialize", skip_serializing_if = "is_zero")]
    pub minsize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plain: Option<PlainFilesystemCustomization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lvm: Option<LvmCustomization>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub btrfs: Option<BtrfsCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlainFilesystemCustomization {
    #[serde(default)]
    pub filesystems: Vec<FilesystemCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemCustomization {
    pub mountpoint: String,
    #[serde(default, deserialize_with = "datasize::deserialize", skip_serializing_if = "is_zero")]
    pub minsize: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub fs_type: Option<FsType>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LvmCustomization {
    #[serde(rename = "volume-groups", default)]
    pub volume_groups: Vec<VgCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VgCustomization {
    /// Volume group name
    pub name: String,
    /// Size of the partition that holds the volume group
    #[serde(default, deserialize_with = "datasize::deserialize", skip_serializing_if = "is_zero")]
    pub minsize: u64,
    #[serde(rename = "logical-volumes", default)]
    pub logical_volumes: Vec<LvCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LvCustomization {
    /// Logical volume name; derived from the mountpoint when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub filesystem: FilesystemCustomization,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtrfsCustomization {
    #[serde(default)]
    pub volumes: Vec<BtrfsVolumeCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtrfsVolumeCustomization {
    /// Size of the btrfs partition
    #[serde(default, deserialize_with = "datasize::deserialize", skip_serializing_if = "is_zero")]
    pub minsize: u64,
    #[serde(default)]
    pub subvolumes: Vec<BtrfsSubvolumeCustomization>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtrfsSubvolumeCustomization {
    #[serde(default)]
    pub name: String,
    pub mountpoint: String,
}

impl PartitioningCustomization {
    /// Customization with only plain filesystems
    pub fn from_plain(filesystems: Vec<FilesystemCustomization>) -> Self {
        PartitioningCustomization {
            plain: Some(PlainFilesystemCustomization { filesystems }),
            ..Default::default()
        }
    }

    /// Decode a JSON customization document
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|source| LayoutError::Decode {
            input: input.to_string(),
            source,
        })
    }

    /// Decode a TOML customization document
    pub fn from_toml(input: &str) -> Result<Self> {
        Ok(toml::from_str(input)?)
    }

    /// Load a customization from a `.toml` or JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml(&content),
            _ => Self::from_json(&content),
        }
    }

    /// Every customized mountpoint: plain filesystems, then logical volumes, then subvolumes
    pub fn mountpoints(&self) -> Vec<&str> {
        let mut mountpoints: Vec<&str> = Vec::new();
        if let Some(plain) = &self.plain {
            mountpoints.extend(plain.filesystems.iter().map(|fs| fs.mountpoint.as_str()));
        }
        if let Some(lvm) = &self.lvm {
            for vg in &lvm.volume_groups {
                mountpoints.extend(
                    vg.logical_volumes
                        .iter()
                        .map(|lv| lv.filesystem.mountpoint.as_str()),
                );
            }
        }
        if let Some(btrfs) = &self.btrfs {
            for volume in &btrfs.volumes {
                mountpoints.extend(volume.subvolumes.iter().map(|s| s.mountpoint.as_str()));
            }
        }
        mountpoints
    }

    /// A separate `/boot` is needed when `/` lives on LVM or btrfs and no
    /// `/boot` was customized.
    pub fn requires_boot_partition(&self) -> bool {
        if self.mountpoints().contains(&"/boot") {
            return false;
        }

        let root_on_lvm = self.lvm.as_ref().is_some_and(|lvm| {
            lvm.volume_groups.iter().any(|vg| {
                vg.logical_volumes
                    .iter()
                    .any(|lv| lv.filesystem.mountpoint == "/")
            })
        });
        let root_on_btrfs = self.btrfs.as_ref().is_some_and(|btrfs| {
            btrfs
                .volumes
                .iter()
                .any(|v| v.subvolumes.iter().any(|s| s.mountpoint == "/"))
        });
        root_on_lvm || root_on_btrfs
    }
}
