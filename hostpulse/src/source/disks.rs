//! Volume enumeration shared by the platform sources.

use std::path::Path;

use sysinfo::Disks;

use crate::types::DiskVolume;

// Memory- and kernel-backed filesystems, matched by prefix ("sys" covers sysfs).
const PSEUDO_FS_PREFIXES: &[&str] = &[
    "tmpfs",
    "devtmpfs",
    "ramfs",
    "proc",
    "sys",
    "devpts",
    "cgroup",
    "debugfs",
    "tracefs",
    "securityfs",
    "pstore",
    "bpf",
    "configfs",
    "mqueue",
    "hugetlbfs",
    "autofs",
    "fusectl",
    "efivarfs",
    "nsfs",
    "binfmt_misc",
];

pub(crate) fn is_pseudo_fs(fs: &str) -> bool {
    let fs = fs.to_ascii_lowercase();
    PSEUDO_FS_PREFIXES.iter().any(|p| fs.starts_with(p))
}

pub(crate) fn keep_volume(fs: &str, read_only: bool, total: u64) -> bool {
    !read_only && total > 0 && !is_pseudo_fs(fs)
}

fn is_root_mount(mount: &Path) -> bool {
    mount.parent().is_none()
}

/// Re-enumerates mounted volumes. Root comes first, the rest keep mount order.
pub(crate) fn read_volumes() -> Vec<DiskVolume> {
    let disks = Disks::new_with_refreshed_list();
    let mut root: Option<DiskVolume> = None;
    let mut volumes = Vec::new();
    for d in disks.list() {
        let fs = d.file_system().to_string_lossy();
        if !keep_volume(&fs, d.is_read_only(), d.total_space()) {
            continue;
        }
        let mount = d.mount_point();
        let mut name = d.name().to_string_lossy().into_owned();
        if name.is_empty() {
            name = mount.display().to_string();
        }
        let vol = DiskVolume::new(
            name,
            mount.display().to_string(),
            fs.into_owned(),
            d.total_space(),
            d.available_space(),
        );
        if root.is_none() && is_root_mount(mount) {
            root = Some(vol);
        } else {
            volumes.push(vol);
        }
    }
    if let Some(r) = root {
        volumes.insert(0, r);
    }
    volumes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pseudo_filesystems_are_dropped() {
        for fs in ["tmpfs", "devtmpfs", "proc", "sysfs", "cgroup2", "TMPFS"] {
            assert!(!keep_volume(fs, false, 1 << 30), "{fs} should be excluded");
        }
    }

    #[test]
    fn real_writable_volumes_are_kept() {
        for fs in ["ext4", "xfs", "btrfs", "NTFS", "apfs"] {
            assert!(keep_volume(fs, false, 1 << 30), "{fs} should be kept");
        }
    }

    #[test]
    fn read_only_or_empty_volumes_are_dropped() {
        assert!(!keep_volume("ext4", true, 1 << 30));
        assert!(!keep_volume("ext4", false, 0));
    }

    #[test]
    fn root_detection() {
        assert!(is_root_mount(Path::new("/")));
        assert!(!is_root_mount(Path::new("/home")));
    }
}
