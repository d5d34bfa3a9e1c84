//! Deterministic identifier generation
//!
//! Identifiers are drawn from a caller-supplied random source in a fixed
//! walk order (table, then each partition and its payload), so the same
//! seed and the same table shape always yield the same identifiers.

use crate::disk::payload::{Filesystem, FsType, Payload};
use crate::disk::table::{PartitionTable, TableType};
use rand::RngCore;
use tracing::debug;
use uuid::Builder;

/// A version 4 UUID built from 16 bytes of `rng`
pub fn random_uuid<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill_bytes(&mut bytes);
    Builder::from_random_bytes(bytes).into_uuid().to_string()
}

/// An 8 hex digit FAT volume serial built from 4 bytes of `rng`
pub fn random_fat_serial<R: RngCore + ?Sized>(rng: &mut R) -> String {
    let mut bytes = [0u8; 4];
    rng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn ensure_filesystem_uuid<R: RngCore + ?Sized>(fs: &mut Filesystem, rng: &mut R) {
    if fs.uuid.is_some() {
        return;
    }
    fs.uuid = Some(match fs.fs_type {
        FsType::Vfat => random_fat_serial(rng),
        _ => random_uuid(rng),
    });
}

/// Fill every missing identifier in `pt`; identifiers already set are kept.
pub fn generate_identifiers<R: RngCore + ?Sized>(pt: &mut PartitionTable, rng: &mut R) {
    if pt.uuid.is_none() {
        pt.uuid = Some(random_uuid(rng));
    }

    let gpt = pt.table_type == TableType::Gpt;
    for partition in &mut pt.partitions {
        if gpt && partition.uuid.is_none() {
            partition.uuid = Some(random_uuid(rng));
        }

        match partition.payload.as_mut() {
            Some(Payload::Filesystem(fs)) => ensure_filesystem_uuid(fs, rng),
            Some(Payload::Lvm(vg)) => {
                if vg.uuid.is_none() {
                    vg.uuid = Some(random_uuid(rng));
                }
                for lv in &mut vg.logical_volumes {
                    ensure_filesystem_uuid(&mut lv.payload, rng);
                }
            }
            Some(Payload::Btrfs(volume)) => {
                let uuid = volume
                    .uuid
                    .get_or_insert_with(|| random_uuid(rng))
                    .clone();
                for subvolume in &mut volume.subvolumes {
                    if subvolume.uuid.is_none() {
                        subvolume.uuid = Some(uuid.clone());
                    }
                }
            }
            None => {}
        }
    }

    debug!("Identifiers generated for {} partitions", pt.partitions.len());
}
