//! Partition table construction from templates and customizations
//!
//! Both entry points produce a finalized table: partitions are created in a
//! canonical order (boot partitions first), sized by the allocator and given
//! identifiers from the caller's random source.

use crate::config::customization::{FilesystemCustomization, PartitioningCustomization};
use crate::config::options::CustomPartitionTableOptions;
use crate::disk::allocator::{allocate, ensure_directory_sizes, ensure_mountpoint_sizes, PartitioningMode};
use crate::disk::identifiers::generate_identifiers;
use crate::disk::partition_types::*;
use crate::disk::payload::{Btrfs, Filesystem, FsType, LvmVolumeGroup, Payload, Subvolume};
use crate::disk::table::{Partition, PartitionTable, TableType};
use crate::utils::datasize::{GIB, MIB};
use crate::utils::error::{LayoutError, Result};
use rand::RngCore;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Size of customized filesystems and volumes that do not declare one
pub const DEFAULT_PARTITION_SIZE: u64 = GIB;

const BIOS_BOOT_SIZE: u64 = MIB;
const EFI_SYSTEM_SIZE: u64 = 200 * MIB;
const BOOT_SIZE: u64 = 512 * MIB;

const BASE_TEMPLATE_UUID: &str = "D209C89E-EA5E-4FBD-B161-B461CCE297E0";

fn size_or_default(size: u64) -> u64 {
    if size == 0 {
        DEFAULT_PARTITION_SIZE
    } else {
        size
    }
}

/// Type code for a partition holding a plain filesystem
fn filesystem_part_type(table_type: TableType, mountpoint: &str) -> &'static str {
    match (table_type, mountpoint) {
        (TableType::Gpt, "/boot") => gpt::XBOOTLDR,
        (TableType::Gpt, _) => gpt::FILESYSTEM_DATA,
        (TableType::Dos, _) => dos::LINUX,
    }
}

/// 1 MiB bootable partition for BIOS bootloaders
pub fn bios_boot_partition(table_type: TableType) -> Partition {
    match table_type {
        TableType::Gpt => Partition::new(BIOS_BOOT_SIZE, gpt::BIOS_BOOT)
            .with_uuid(BIOS_BOOT_PARTITION_UUID)
            .bootable(),
        TableType::Dos => Partition::new(BIOS_BOOT_SIZE, dos::BIOS_BOOT).bootable(),
    }
}

/// EFI system partition mounted at `/boot/efi`
pub fn efi_system_partition(table_type: TableType) -> Partition {
    let mut fs = Filesystem::new(FsType::Vfat, "/boot/efi").with_label(EFI_LABEL);
    fs.uuid = Some(EFI_FILESYSTEM_UUID.to_string());
    fs.fstab_options = EFI_FSTAB_OPTIONS.to_string();
    fs.fstab_passno = 2;

    let partition = match table_type {
        TableType::Gpt => Partition::new(EFI_SYSTEM_SIZE, gpt::EFI_SYSTEM)
            .with_uuid(EFI_SYSTEM_PARTITION_UUID),
        TableType::Dos => Partition::new(EFI_SYSTEM_SIZE, dos::EFI_SYSTEM),
    };
    partition.with_payload(Payload::Filesystem(fs))
}

/// Separate `/boot` for roots the bootloader cannot read directly
pub fn boot_partition(table_type: TableType, fs_type: FsType) -> Partition {
    Partition::new(BOOT_SIZE, filesystem_part_type(table_type, "/boot")).with_payload(
        Payload::Filesystem(Filesystem::new(fs_type, "/boot").with_label("boot")),
    )
}

/// GPT template with BIOS boot, EFI system, `/boot` and `/` partitions
pub fn base_template() -> PartitionTable {
    PartitionTable::new(TableType::Gpt)
        .with_uuid(BASE_TEMPLATE_UUID)
        .with_partition(bios_boot_partition(TableType::Gpt))
        .with_partition(efi_system_partition(TableType::Gpt))
        .with_partition(
            Partition::new(500 * MIB, gpt::XBOOTLDR)
                .with_uuid(BOOT_PARTITION_UUID)
                .with_payload(Payload::Filesystem(
                    Filesystem::new(FsType::Ext4, "/boot").with_label("boot"),
                )),
        )
        .with_partition(
            Partition::new(2 * GIB, gpt::FILESYSTEM_DATA)
                .with_uuid(ROOT_PARTITION_UUID)
                .with_payload(Payload::Filesystem(
                    Filesystem::new(FsType::Ext4, "/").with_label("root"),
                )),
        )
}

fn plain_partition(
    table_type: TableType,
    customization: &FilesystemCustomization,
    default_fs_type: FsType,
) -> Partition {
    let fs_type = customization.fs_type.unwrap_or(default_fs_type);
    let mut fs = Filesystem::new(fs_type, &customization.mountpoint);
    if let Some(label) = &customization.label {
        fs = fs.with_label(label);
    }
    Partition::new(
        size_or_default(customization.minsize),
        filesystem_part_type(table_type, &customization.mountpoint),
    )
    .with_payload(Payload::Filesystem(fs))
}

/// Build and finalize a table from user customizations.
///
/// Boot-mode partitions come first, followed by an automatic `/boot` when
/// `/` lives on LVM or btrfs, then plain filesystems, the volume group and
/// the btrfs volume in declaration order. A plain `/` is added when nothing
/// provides one.
pub fn new_custom_partition_table<R: RngCore + ?Sized>(
    customization: Option<&PartitioningCustomization>,
    options: &CustomPartitionTableOptions,
    rng: &mut R,
) -> Result<PartitionTable> {
    let empty = PartitioningCustomization::default();
    let customization = customization.unwrap_or(&empty);
    customization.validate()?;

    let default_fs_type = options.default_fs_type.ok_or_else(|| {
        LayoutError::Configuration("no default filesystem type".to_string())
    })?;
    let table_type = options.table_type();
    let mut pt = PartitionTable::new(table_type);

    if options.boot_mode.needs_bios_boot() {
        pt.partitions.push(bios_boot_partition(table_type));
    }
    if options.boot_mode.needs_efi() {
        pt.partitions.push(efi_system_partition(table_type));
    }
    if customization.requires_boot_partition() {
        debug!("Root is not on a plain partition, adding /boot");
        pt.partitions.push(boot_partition(table_type, default_fs_type));
    }

    if let Some(plain) = &customization.plain {
        for fs in &plain.filesystems {
            pt.partitions.push(plain_partition(table_type, fs, default_fs_type));
        }
    }

    if let Some(lvm) = &customization.lvm {
        for vg_customization in &lvm.volume_groups {
            let mut vg = LvmVolumeGroup::new(&vg_customization.name);
            for lv in &vg_customization.logical_volumes {
                let fs = &lv.filesystem;
                let mut payload = Filesystem::new(fs.fs_type.unwrap_or(default_fs_type), &fs.mountpoint);
                if let Some(label) = &fs.label {
                    payload = payload.with_label(label);
                }
                vg.create_logical_volume(
                    lv.name.as_deref().unwrap_or_default(),
                    size_or_default(fs.minsize),
                    payload,
                )?;
            }
            let part_type = match table_type {
                TableType::Gpt => gpt::LVM,
                TableType::Dos => dos::LVM,
            };
            pt.partitions.push(
                Partition::new(vg_customization.minsize, part_type).with_payload(Payload::Lvm(vg)),
            );
        }
    }

    if let Some(btrfs) = &customization.btrfs {
        for volume in &btrfs.volumes {
            let subvolumes = volume
                .subvolumes
                .iter()
                .map(|s| Subvolume {
                    name: s.name.clone(),
                    mountpoint: s.mountpoint.clone(),
                    uuid: None,
                    size: None,
                })
                .collect();
            pt.partitions.push(
                Partition::new(size_or_default(volume.minsize), filesystem_part_type(table_type, ""))
                    .with_payload(Payload::Btrfs(Btrfs {
                        uuid: None,
                        label: None,
                        subvolumes,
                    })),
            );
        }
    }

    if pt.find_mountpoint("/").is_none() {
        debug!("No root filesystem customized, adding a {} root", default_fs_type);
        pt.partitions.push(
            Partition::new(DEFAULT_PARTITION_SIZE, filesystem_part_type(table_type, "/"))
                .with_payload(Payload::Filesystem(
                    Filesystem::new(default_fs_type, "/").with_label("root"),
                )),
        );
    }

    ensure_directory_sizes(&mut pt, &options.required_min_sizes)?;
    allocate(&mut pt, customization.minsize, options.mode)?;
    generate_identifiers(&mut pt, rng);

    info!(
        "Built custom {} partition table with {} partitions",
        pt.table_type,
        pt.partitions.len()
    );
    Ok(pt)
}

/// Instantiate a shared template for one build.
///
/// Mountpoints already in the template grow to their requested minimum;
/// new mountpoints get plain partitions formatted like the template's root.
pub fn new_partition_table<R: RngCore + ?Sized>(
    template: &PartitionTable,
    mountpoints: &[FilesystemCustomization],
    image_size: u64,
    mode: PartitioningMode,
    required_min_sizes: &BTreeMap<String, u64>,
    rng: &mut R,
) -> Result<PartitionTable> {
    PartitioningCustomization::from_plain(mountpoints.to_vec()).validate()?;

    let mut pt = template.instantiate();
    let root_fs_type = pt
        .find_mountpoint("/")
        .map(|root| root.fs_type())
        .ok_or(LayoutError::MissingRoot)?;

    let mut existing = BTreeMap::new();
    for mp in mountpoints {
        if pt.find_mountpoint(&mp.mountpoint).is_some() {
            existing.insert(mp.mountpoint.clone(), mp.minsize);
        } else {
            debug!("Adding {} partition for {}", root_fs_type, mp.mountpoint);
            let customization = FilesystemCustomization {
                fs_type: mp.fs_type.or(Some(root_fs_type)),
                ..mp.clone()
            };
            pt.partitions
                .push(plain_partition(pt.table_type, &customization, root_fs_type));
        }
    }
    ensure_mountpoint_sizes(&mut pt, &existing)?;

    ensure_directory_sizes(&mut pt, required_min_sizes)?;
    allocate(&mut pt, image_size, mode)?;
    generate_identifiers(&mut pt, rng);
    Ok(pt)
}

fn format_size(size: u64) -> String {
    if size % GIB == 0 {
        format!("{} GiB", size / GIB)
    } else if size % MIB == 0 {
        format!("{} MiB", size / MIB)
    } else {
        format!("{} B", size)
    }
}

/// Print a human-readable table summary
pub fn print_table_summary(pt: &PartitionTable) {
    println!(
        "\nPartition table ({}, total: {}):",
        pt.table_type,
        format_size(pt.size)
    );
    println!(
        "{:<4} {:>12} {:>12} {:<8} {:<20}",
        "NUM", "START", "SIZE", "KIND", "MOUNT"
    );
    println!("{}", "-".repeat(60));

    for (i, part) in pt.partitions.iter().enumerate() {
        let kind = match &part.payload {
            Some(Payload::Filesystem(fs)) => fs.fs_type.to_string(),
            Some(Payload::Lvm(_)) => "lvm".to_string(),
            Some(Payload::Btrfs(_)) => "btrfs".to_string(),
            None => "-".to_string(),
        };
        let mountpoints = part.mountpoints();
        let mount = if mountpoints.is_empty() {
            "-".to_string()
        } else {
            mountpoints.join(", ")
        };

        println!(
            "{:<4} {:>12} {:>12} {:<8} {:<20}",
            i + 1,
            format_size(part.start),
            format_size(part.size),
            kind,
            mount
        );
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::customization::*;
    use crate::config::options::{default_required_dir_sizes, BootMode};
    use crate::disk::identifiers::tests::CountingRng;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const GPT_RESERVED: u64 = 512 + 128 * 128;

    const UUID_1: &str = "00010203-0405-4607-8809-0a0b0c0d0e0f";
    const UUID_2: &str = "10111213-1415-4617-9819-1a1b1c1d1e1f";
    const UUID_3: &str = "20212223-2425-4627-a829-2a2b2c2d2e2f";
    const UUID_4: &str = "30313233-3435-4637-b839-3a3b3c3d3e3f";
    const UUID_5: &str = "40414243-4445-4647-8849-4a4b4c4d4e4f";

    fn options(
        default_fs_type: FsType,
        table_type: Option<TableType>,
    ) -> CustomPartitionTableOptions {
        CustomPartitionTableOptions {
            default_fs_type: Some(default_fs_type),
            boot_mode: BootMode::Hybrid,
            table_type,
            ..Default::default()
        }
    }

    fn fs(mountpoint: &str, minsize: u64, label: Option<&str>, fs_type: Option<FsType>) -> FilesystemCustomization {
        FilesystemCustomization {
            mountpoint: mountpoint.to_string(),
            minsize,
            label: label.map(str::to_string),
            fs_type,
        }
    }

    fn filesystem(partition: &Partition) -> &Filesystem {
        match &partition.payload {
            Some(Payload::Filesystem(fs)) => fs,
            other => panic!("expected a filesystem, got {other:?}"),
        }
    }

    fn starts(pt: &PartitionTable) -> Vec<u64> {
        pt.partitions.iter().map(|p| p.start).collect()
    }

    #[test]
    fn dos_hybrid_with_small_root() {
        let c = PartitioningCustomization::from_plain(vec![fs("/", 50 * MIB, None, None)]);
        let pt = new_custom_partition_table(
            Some(&c),
            &options(FsType::Xfs, Some(TableType::Dos)),
            &mut CountingRng(0),
        )
        .unwrap();

        assert_eq!(pt.table_type, TableType::Dos);
        assert_eq!(starts(&pt), vec![MIB, 2 * MIB, 202 * MIB]);
        assert_eq!(pt.partitions[0].size, MIB);
        assert!(pt.partitions[0].bootable);
        assert_eq!(pt.partitions[0].part_type, dos::BIOS_BOOT);
        assert_eq!(pt.partitions[1].size, 200 * MIB);
        assert_eq!(pt.partitions[1].part_type, dos::EFI_SYSTEM);
        assert_eq!(pt.partitions[2].size, 50 * MIB);
        assert_eq!(pt.size, 252 * MIB);

        // dos partitions carry no uuid
        assert!(pt.partitions.iter().all(|p| p.uuid.is_none()));
        assert_eq!(pt.uuid.as_deref(), Some(UUID_1));

        let esp = filesystem(&pt.partitions[1]);
        assert_eq!(esp.uuid.as_deref(), Some(EFI_FILESYSTEM_UUID));
        assert_eq!(esp.label.as_deref(), Some(EFI_LABEL));
        assert_eq!(esp.fstab_options, EFI_FSTAB_OPTIONS);
        assert_eq!(esp.fstab_passno, 2);

        let root = filesystem(&pt.partitions[2]);
        assert_eq!(root.fs_type, FsType::Xfs);
        assert_eq!(root.uuid.as_deref(), Some(UUID_2));
    }

    #[test]
    fn null_customization_adds_root() {
        let pt = new_custom_partition_table(
            None,
            &options(FsType::Xfs, Some(TableType::Dos)),
            &mut CountingRng(0),
        )
        .unwrap();

        assert_eq!(starts(&pt), vec![MIB, 2 * MIB, 202 * MIB]);
        assert_eq!(pt.partitions[2].size, GIB);
        assert_eq!(pt.size, 202 * MIB + GIB);
        let root = filesystem(&pt.partitions[2]);
        assert_eq!(root.mountpoint.as_deref(), Some("/"));
        assert_eq!(root.label.as_deref(), Some("root"));
    }

    #[test]
    fn null_customization_with_required_sizes() {
        let mut opts = options(FsType::Xfs, Some(TableType::Dos));
        opts.required_min_sizes = default_required_dir_sizes();
        let pt = new_custom_partition_table(None, &opts, &mut CountingRng(0)).unwrap();

        assert_eq!(pt.partitions[2].size, 3 * GIB);
        assert_eq!(pt.size, 202 * MIB + 3 * GIB);
    }

    #[test]
    fn plain_customization_on_gpt() {
        let c = PartitioningCustomization::from_plain(vec![
            fs("/", 50 * MIB, Some("root"), Some(FsType::Xfs)),
            fs("/home", 20 * MIB, Some("home"), Some(FsType::Ext4)),
        ]);
        let mut opts = options(FsType::Ext4, Some(TableType::Gpt));
        opts.required_min_sizes = default_required_dir_sizes();
        let pt = new_custom_partition_table(Some(&c), &opts, &mut CountingRng(0)).unwrap();

        assert_eq!(starts(&pt), vec![MIB, 2 * MIB, 202 * MIB, 222 * MIB]);
        assert_eq!(pt.partitions[0].uuid.as_deref(), Some(BIOS_BOOT_PARTITION_UUID));
        assert_eq!(pt.partitions[1].uuid.as_deref(), Some(EFI_SYSTEM_PARTITION_UUID));

        // root is laid out last and gives up the backup header space
        assert_eq!(pt.partitions[2].mountpoints(), vec!["/home"]);
        assert_eq!(pt.partitions[2].size, 20 * MIB);
        assert_eq!(pt.partitions[3].mountpoints(), vec!["/"]);
        assert_eq!(pt.partitions[3].size, 3 * GIB + MIB - GPT_RESERVED);
        assert_eq!(pt.size, 222 * MIB + 3 * GIB + MIB);

        assert_eq!(pt.partitions[2].uuid.as_deref(), Some(UUID_2));
        assert_eq!(filesystem(&pt.partitions[2]).uuid.as_deref(), Some(UUID_3));
        assert_eq!(filesystem(&pt.partitions[2]).fs_type, FsType::Ext4);
        assert_eq!(pt.partitions[3].uuid.as_deref(), Some(UUID_4));
        assert_eq!(filesystem(&pt.partitions[3]).uuid.as_deref(), Some(UUID_5));
        assert_eq!(filesystem(&pt.partitions[3]).fs_type, FsType::Xfs);
    }

    fn lvm_customization() -> PartitioningCustomization {
        let lv = |name: &str, mountpoint: &str, minsize: u64, label: &str, fs_type: Option<FsType>| {
            LvCustomization {
                name: Some(name.to_string()),
                filesystem: fs(mountpoint, minsize, Some(label), fs_type),
            }
        };
        PartitioningCustomization {
            lvm: Some(LvmCustomization {
                volume_groups: vec![VgCustomization {
                    name: "testvg".to_string(),
                    minsize: 100 * MIB,
                    logical_volumes: vec![
                        lv("varloglv", "/var/log", 10 * MIB, "var-log", Some(FsType::Xfs)),
                        lv("rootlv", "/", 50 * MIB, "root", Some(FsType::Xfs)),
                        lv("datalv", "/data", 100 * MIB, "data", None),
                    ],
                }],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn lvm_customization_adds_boot_partition() {
        let pt = new_custom_partition_table(
            Some(&lvm_customization()),
            &options(FsType::Ext4, None),
            &mut CountingRng(0),
        )
        .unwrap();

        assert_eq!(pt.table_type, TableType::Gpt);
        assert_eq!(starts(&pt), vec![MIB, 2 * MIB, 202 * MIB, 714 * MIB]);

        let boot = &pt.partitions[2];
        assert_eq!(boot.size, 512 * MIB);
        assert_eq!(boot.part_type, gpt::XBOOTLDR);
        assert_eq!(filesystem(boot).label.as_deref(), Some("boot"));
        assert_eq!(filesystem(boot).fs_type, FsType::Ext4);

        let vg_partition = &pt.partitions[3];
        assert_eq!(vg_partition.part_type, gpt::LVM);
        assert_eq!(vg_partition.size, 166 * MIB - GPT_RESERVED);
        assert_eq!(pt.size, 880 * MIB);

        match &vg_partition.payload {
            Some(Payload::Lvm(vg)) => {
                assert_eq!(vg.name, "testvg");
                let sizes: Vec<u64> = vg.logical_volumes.iter().map(|lv| lv.size).collect();
                assert_eq!(sizes, vec![12 * MIB, 52 * MIB, 100 * MIB]);
                assert_eq!(vg.logical_volumes[2].payload.fs_type, FsType::Ext4);
                assert_eq!(vg.logical_volumes[2].payload.label.as_deref(), Some("data"));
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(
            pt.kernel_options().unwrap()[1],
            "rd.lvm.lv=testvg/rootlv".to_string()
        );
    }

    #[test]
    fn btrfs_customization_shares_volume_uuid() {
        let c = PartitioningCustomization {
            btrfs: Some(BtrfsCustomization {
                volumes: vec![BtrfsVolumeCustomization {
                    minsize: 230 * MIB,
                    subvolumes: vec![
                        BtrfsSubvolumeCustomization {
                            name: "subvol/root".to_string(),
                            mountpoint: "/".to_string(),
                        },
                        BtrfsSubvolumeCustomization {
                            name: "subvol/home".to_string(),
                            mountpoint: "/home".to_string(),
                        },
                        BtrfsSubvolumeCustomization {
                            name: "subvol/varlog".to_string(),
                            mountpoint: "/var/log".to_string(),
                        },
                    ],
                }],
            }),
            ..Default::default()
        };
        let pt = new_custom_partition_table(
            Some(&c),
            &options(FsType::Ext4, Some(TableType::Gpt)),
            &mut CountingRng(0),
        )
        .unwrap();

        assert_eq!(starts(&pt), vec![MIB, 2 * MIB, 202 * MIB, 714 * MIB]);
        let part = &pt.partitions[3];
        assert_eq!(part.size, 231 * MIB - GPT_RESERVED);
        assert_eq!(pt.size, 945 * MIB);

        // table, /boot partition, /boot fs, btrfs partition, btrfs volume
        assert_eq!(part.uuid.as_deref(), Some(UUID_4));
        match &part.payload {
            Some(Payload::Btrfs(volume)) => {
                assert_eq!(volume.uuid.as_deref(), Some(UUID_5));
                assert!(volume.subvolumes.iter().all(|s| s.uuid == volume.uuid));
                assert_eq!(volume.subvolumes[0].size, Some(part.size));
                assert_eq!(volume.subvolumes[1].size, None);
            }
            other => panic!("unexpected payload: {other:?}"),
        }
        assert_eq!(pt.mountpoint_size("/home").unwrap(), part.size);
        assert_eq!(
            pt.kernel_options().unwrap(),
            vec![
                format!("root=UUID={}", UUID_5),
                "rootflags=subvol=subvol/root".to_string()
            ]
        );
    }

    #[test]
    fn invalid_customization_is_rejected_before_building() {
        let c = PartitioningCustomization::from_plain(vec![
            fs("/data", 0, None, None),
            fs("/data", 0, None, None),
        ]);
        let err = new_custom_partition_table(
            Some(&c),
            &options(FsType::Xfs, None),
            &mut CountingRng(0),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::Validation(_)));
    }

    #[test]
    fn missing_default_fs_type_is_an_error() {
        let opts = CustomPartitionTableOptions::default();
        let err = new_custom_partition_table(None, &opts, &mut CountingRng(0)).unwrap_err();
        assert_eq!(
            err.to_string(),
            "error generating partition table: no default filesystem type"
        );
    }

    #[test]
    fn strict_mode_reports_geometry_error() {
        let mut c = PartitioningCustomization::from_plain(vec![fs("/", 2 * GIB, None, None)]);
        c.minsize = GIB;
        let mut opts = options(FsType::Xfs, None);
        opts.mode = PartitioningMode::Strict;

        let err = new_custom_partition_table(Some(&c), &opts, &mut CountingRng(0)).unwrap_err();
        assert!(matches!(err, LayoutError::Geometry { .. }));
    }

    #[test]
    fn unrepresentable_sizes_are_geometry_errors() {
        let c = PartitioningCustomization::from_json(r#"{"minsize": 18446744073709551615}"#).unwrap();
        for mode in [PartitioningMode::Grow, PartitioningMode::Strict] {
            let mut opts = options(FsType::Xfs, Some(TableType::Gpt));
            opts.mode = mode;
            let err = new_custom_partition_table(Some(&c), &opts, &mut CountingRng(0)).unwrap_err();
            assert!(matches!(err, LayoutError::Geometry { .. }), "{err}");
        }

        let c = PartitioningCustomization::from_plain(vec![fs("/", u64::MAX, None, None)]);
        let err = new_custom_partition_table(
            Some(&c),
            &options(FsType::Xfs, Some(TableType::Dos)),
            &mut CountingRng(0),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::Geometry { .. }));
    }

    #[test]
    fn customization_minsize_grows_root() {
        let mut c = PartitioningCustomization::from_plain(vec![fs("/", 50 * MIB, None, None)]);
        c.minsize = GIB;
        let pt = new_custom_partition_table(
            Some(&c),
            &options(FsType::Xfs, Some(TableType::Dos)),
            &mut CountingRng(0),
        )
        .unwrap();
        assert_eq!(pt.size, GIB);
        assert_eq!(pt.partitions[2].size, GIB - 202 * MIB);
    }

    #[test]
    fn same_seed_builds_identical_tables() {
        let build = |seed: u64| {
            new_custom_partition_table(
                Some(&lvm_customization()),
                &options(FsType::Ext4, None),
                &mut StdRng::seed_from_u64(seed),
            )
            .unwrap()
        };
        assert_eq!(build(0), build(0));
        assert_ne!(build(0).uuid, build(1).uuid);
    }

    #[test]
    fn base_template_instantiation() {
        let template = base_template();
        let pt = new_partition_table(
            &template,
            &[],
            0,
            PartitioningMode::Grow,
            &BTreeMap::new(),
            &mut CountingRng(0),
        )
        .unwrap();

        assert_eq!(starts(&pt), vec![MIB, 2 * MIB, 202 * MIB, 702 * MIB]);
        assert_eq!(pt.partitions[3].size, 2 * GIB + MIB - GPT_RESERVED);
        assert_eq!(pt.uuid.as_deref(), Some(BASE_TEMPLATE_UUID));
        assert_eq!(filesystem(&pt.partitions[2]).uuid.as_deref(), Some(UUID_1));
        assert_eq!(filesystem(&pt.partitions[3]).uuid.as_deref(), Some(UUID_2));

        // the shared template is never touched
        assert!(!template.is_finalized());
        assert_eq!(template.partitions[3].start, 0);
        assert!(filesystem(&template.partitions[3]).uuid.is_none());
    }

    #[test]
    fn template_grows_existing_and_adds_new_mountpoints() {
        let pt = new_partition_table(
            &base_template(),
            &[fs("/", 5 * GIB, None, None), fs("/var", 100 * MIB, None, None)],
            0,
            PartitioningMode::Grow,
            &BTreeMap::new(),
            &mut CountingRng(0),
        )
        .unwrap();

        assert_eq!(
            starts(&pt),
            vec![MIB, 2 * MIB, 202 * MIB, 702 * MIB, 802 * MIB]
        );
        assert_eq!(pt.partitions[3].mountpoints(), vec!["/var"]);
        assert_eq!(filesystem(&pt.partitions[3]).fs_type, FsType::Ext4);
        assert_eq!(pt.mountpoint_size("/").unwrap(), 5 * GIB + MIB - GPT_RESERVED);
    }

    #[test]
    fn template_rejects_duplicate_mountpoints() {
        let err = new_partition_table(
            &base_template(),
            &[fs("/var", 0, None, None), fs("/var", 0, None, None)],
            0,
            PartitioningMode::Grow,
            &BTreeMap::new(),
            &mut CountingRng(0),
        )
        .unwrap_err();
        assert!(err.to_string().contains("duplicate mountpoint \"/var\""));
    }

    #[test]
    fn template_without_root_is_rejected() {
        let template = PartitionTable::new(TableType::Gpt)
            .with_partition(bios_boot_partition(TableType::Gpt));
        let err = new_partition_table(
            &template,
            &[],
            0,
            PartitioningMode::Grow,
            &BTreeMap::new(),
            &mut CountingRng(0),
        )
        .unwrap_err();
        assert!(matches!(err, LayoutError::MissingRoot));
    }

    #[test]
    fn size_formatting() {
        assert_eq!(format_size(3 * GIB), "3 GiB");
        assert_eq!(format_size(202 * MIB), "202 MiB");
        assert_eq!(format_size(GIB - GPT_RESERVED), format!("{} B", GIB - GPT_RESERVED));
    }
}
