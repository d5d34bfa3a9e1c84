//! Options supplied by the calling layer when building a custom table

use crate::disk::allocator::PartitioningMode;
use crate::disk::payload::FsType;
use crate::disk::table::TableType;
use crate::utils::datasize::GIB;
use crate::utils::error::{LayoutError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// Firmware the image has to boot on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootMode {
    /// No boot partitions (e.g. images booted by an external loader)
    #[default]
    None,
    /// BIOS only
    Legacy,
    /// UEFI only
    Uefi,
    /// BIOS and UEFI
    Hybrid,
}

impl BootMode {
    pub fn needs_bios_boot(&self) -> bool {
        matches!(self, Self::Legacy | Self::Hybrid)
    }

    pub fn needs_efi(&self) -> bool {
        matches!(self, Self::Uefi | Self::Hybrid)
    }
}

impl std::fmt::Display for BootMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Legacy => write!(f, "legacy"),
            Self::Uefi => write!(f, "uefi"),
            Self::Hybrid => write!(f, "hybrid"),
        }
    }
}

impl FromStr for BootMode {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "none" => Ok(Self::None),
            "legacy" => Ok(Self::Legacy),
            "uefi" => Ok(Self::Uefi),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(LayoutError::Configuration(format!(
                "invalid boot mode: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomPartitionTableOptions {
    /// Filesystem type for customizations that do not name one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_fs_type: Option<FsType>,
    #[serde(default)]
    pub boot_mode: BootMode,
    /// Table type; gpt when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_type: Option<TableType>,
    /// Minimum sizes of directories, charged to the mountable holding them
    #[serde(default)]
    pub required_min_sizes: BTreeMap<String, u64>,
    #[serde(default)]
    pub mode: PartitioningMode,
}

impl CustomPartitionTableOptions {
    pub fn table_type(&self) -> TableType {
        self.table_type.unwrap_or_default()
    }
}

/// Directory sizes most operating system images need: 1 GiB for `/` and 2 GiB for `/usr`
pub fn default_required_dir_sizes() -> BTreeMap<String, u64> {
    BTreeMap::from([("/".to_string(), GIB), ("/usr".to_string(), 2 * GIB)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boot_mode_partitions() {
        assert!(!BootMode::None.needs_bios_boot());
        assert!(!BootMode::None.needs_efi());
        assert!(BootMode::Legacy.needs_bios_boot());
        assert!(!BootMode::Legacy.needs_efi());
        assert!(!BootMode::Uefi.needs_bios_boot());
        assert!(BootMode::Uefi.needs_efi());
        assert!(BootMode::Hybrid.needs_bios_boot());
        assert!(BootMode::Hybrid.needs_efi());
    }

    #[test]
    fn boot_mode_parses_lowercase_names() {
        for mode in [BootMode::None, BootMode::Legacy, BootMode::Uefi, BootMode::Hybrid] {
            assert_eq!(mode.to_string().parse::<BootMode>().unwrap(), mode);
        }
        assert!("bios".parse::<BootMode>().is_err());
    }

    #[test]
    fn options_default_to_gpt_and_grow() {
        let options = CustomPartitionTableOptions::default();
        assert_eq!(options.table_type(), TableType::Gpt);
        assert_eq!(options.mode, PartitioningMode::Grow);
        assert_eq!(options.boot_mode, BootMode::None);
        assert!(options.default_fs_type.is_none());
    }

    #[test]
    fn options_decode_from_toml() {
        let options: CustomPartitionTableOptions = toml::from_str(
            r#"
default_fs_type = "xfs"
boot_mode = "hybrid"
table_type = "dos"
mode = "strict"

[required_min_sizes]
"/" = 1073741824
"#,
        )
        .unwrap();
        assert_eq!(options.default_fs_type, Some(FsType::Xfs));
        assert_eq!(options.boot_mode, BootMode::Hybrid);
        assert_eq!(options.table_type(), TableType::Dos);
        assert_eq!(options.mode, PartitioningMode::Strict);
        assert_eq!(options.required_min_sizes["/"], GIB);
    }
}
