//! Removable media store.
//!
//! Volume discovery enumerates the system disk list and keeps only entries
//! the OS flags as removable, so fixed internal disks are never offered as
//! a key-storage target.
//!
//! File I/O is deliberately plain byte transfer; callers decide what the
//! bytes mean (wrapped keys, public key PEM, signed documents).

use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// A mounted removable volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovableVolume {
    pub mount_path: PathBuf,
}

impl RemovableVolume {
    pub fn new(mount_path: impl Into<PathBuf>) -> Self {
        Self {
            mount_path: mount_path.into(),
        }
    }
}

/// Enumerate currently mounted removable volumes.
pub fn list_removable_volumes() -> Vec<RemovableVolume> {
    let disks = Disks::new_with_refreshed_list();
    let volumes = removable_mount_points(&disks);
    log::debug!("found {} removable volume(s)", volumes.len());
    volumes
}

fn removable_mount_points(disks: &Disks) -> Vec<RemovableVolume> {
    disks
        .list()
        .iter()
        .filter(|d| d.is_removable())
        .map(|d| RemovableVolume::new(d.mount_point()))
        .collect()
}

/// Write `data` to `filename` on a volume. The volume path must exist.
pub fn write_file(volume_path: &Path, filename: &str, data: &[u8]) -> Result<PathBuf> {
    if !volume_path.is_dir() {
        return Err(Error::NoSuchPath(volume_path.to_path_buf()));
    }
    let target = volume_path.join(filename);
    std::fs::write(&target, data)?;
    log::info!("wrote {} bytes to {}", data.len(), target.display());
    Ok(target)
}

/// Read a file's bytes, reporting a missing file as [`Error::NoSuchPath`].
pub fn read_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(Error::NoSuchPath(path.to_path_buf()));
    }
    Ok(std::fs::read(path)?)
}
