//! Structural checks on partitioning customizations

use crate::config::customization::PartitioningCustomization;
use crate::utils::error::{LayoutError, Result};
use std::collections::HashSet;

fn invalid(msg: String) -> LayoutError {
    LayoutError::Validation(msg)
}

impl PartitioningCustomization {
    /// Check the document for combinations the translator cannot build.
    ///
    /// Returns the first violation found; nothing is mutated.
    pub fn validate(&self) -> Result<()> {
        let volume_groups = self
            .lvm
            .as_ref()
            .map(|lvm| lvm.volume_groups.as_slice())
            .unwrap_or_default();
        let btrfs_volumes = self
            .btrfs
            .as_ref()
            .map(|btrfs| btrfs.volumes.as_slice())
            .unwrap_or_default();

        if self.btrfs.is_some() && self.lvm.is_some() {
            return Err(invalid(
                "btrfs and lvm partitioning cannot be combined".to_string(),
            ));
        }
        if btrfs_volumes.len() > 1 {
            return Err(invalid(
                "multiple btrfs volumes are not yet supported".to_string(),
            ));
        }
        if volume_groups.len() > 1 {
            return Err(invalid(
                "multiple LVM volume groups are not yet supported".to_string(),
            ));
        }

        if let Some(plain) = &self.plain {
            if plain.filesystems.iter().any(|fs| fs.mountpoint.is_empty()) {
                return Err(invalid(
                    "filesystem with empty mountpoint in partitioning customizations".to_string(),
                ));
            }
        }
        for vg in volume_groups {
            if vg
                .logical_volumes
                .iter()
                .any(|lv| lv.filesystem.mountpoint.is_empty())
            {
                return Err(invalid(
                    "logical volume with empty mountpoint in partitioning customizations"
                        .to_string(),
                ));
            }
        }
        for volume in btrfs_volumes {
            if volume.subvolumes.iter().any(|s| s.mountpoint.is_empty()) {
                return Err(invalid(
                    "btrfs subvolume with empty mountpoint in partitioning customizations"
                        .to_string(),
                ));
            }
            if volume.subvolumes.iter().any(|s| s.name.is_empty()) {
                return Err(invalid(
                    "btrfs subvolume with empty name in partitioning customizations".to_string(),
                ));
            }
        }

        for vg in volume_groups {
            let mut names = HashSet::new();
            let named = vg.logical_volumes.iter().filter_map(|lv| lv.name.as_deref());
            for name in named.filter(|n| !n.is_empty()) {
                if !names.insert(name) {
                    return Err(invalid(format!(
                        "duplicate lvm logical volume name {:?} in volume group {:?} in partitioning customizations",
                        name, vg.name
                    )));
                }
            }
        }
        for volume in btrfs_volumes {
            let mut names = HashSet::new();
            for subvolume in &volume.subvolumes {
                if !names.insert(subvolume.name.as_str()) {
                    return Err(invalid(format!(
                        "duplicate btrfs subvolume name {:?} in partitioning customizations",
                        subvolume.name
                    )));
                }
            }
        }

        let mut mountpoints = HashSet::new();
        for mountpoint in self.mountpoints() {
            if !mountpoints.insert(mountpoint) {
                return Err(invalid(format!(
                    "duplicate mountpoint {:?} in partitioning customizations",
                    mountpoint
                )));
            }
        }

        Ok(())
    }
}
