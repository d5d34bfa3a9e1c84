//! Partition type codes and well-known identifiers

/// GPT partition type GUIDs
pub mod gpt {
    pub const BIOS_BOOT: &str = "21686148-6449-6E6F-744E-656564454649";
    pub const EFI_SYSTEM: &str = "C12A7328-F81F-11D2-BA4B-00A0C93EC93B";
    pub const FILESYSTEM_DATA: &str = "0FC63DAF-8483-4772-8E79-3D69D8477DE4";
    pub const XBOOTLDR: &str = "BC13C2FF-59E6-4262-A352-B275FD6F7172";
    pub const LVM: &str = "E6D6D379-F507-44C2-A23C-238F2A3DF928";
}

/// DOS (MBR) partition type ids
pub mod dos {
    /// MBR has no BIOS boot partition; the gap is recorded as an empty entry
    pub const BIOS_BOOT: &str = "00";
    pub const EFI_SYSTEM: &str = "ef";
    pub const LINUX: &str = "83";
    pub const LVM: &str = "8e";
}

/// Fixed partition UUIDs, stable across builds
pub const BIOS_BOOT_PARTITION_UUID: &str = "FAC7F1FB-3E8D-4137-A512-961DE09A5549";
pub const EFI_SYSTEM_PARTITION_UUID: &str = "68B2905B-DF3E-4FB3-80FA-49D1E773AA33";
pub const ROOT_PARTITION_UUID: &str = "6264D520-3FB9-423F-8AB8-7A0A8E3D3562";
pub const BOOT_PARTITION_UUID: &str = "CB07C243-BC44-4717-853E-28852021225B";

/// FAT volume serial of the EFI system partition
pub const EFI_FILESYSTEM_UUID: &str = "7B77-95E7";

pub const EFI_FSTAB_OPTIONS: &str = "defaults,uid=0,gid=0,umask=077,shortname=winnt";
pub const EFI_LABEL: &str = "EFI-SYSTEM";
