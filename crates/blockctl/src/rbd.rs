//! Access to the rbd kernel module's sysfs bus.

use std::fs;
use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;

use error_stack::Report;
use error_stack::ResultExt;
use crate::error::BlockError;
use crate::exec::Executor;

pub const DEFAULT_SYS_BUS_PATH: &str = "/sys/bus/rbd";
pub const REMOVE_SINGLE_MAJOR_NODE: &str = "remove_single_major";
pub const REMOVE_NODE: &str = "remove";
pub const SINGLE_MAJOR_ACTION: &str = "check rbd single major";

const DEVICES_DIR: &str = "devices";
const DEVICE_PREFIX: &str = "/dev/rbd";
const SINGLE_MAJOR_PARAM: &str = "single_major:";

/// An image mapped to `/dev/rbd<id>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedImage {
    pub id: u32,
    pub pool: String,
    pub name: String,
}

impl MappedImage {
    pub fn device_path(&self) -> String {
        format!("{DEVICE_PREFIX}{}", self.id)
    }
}

/// Returns true if the loaded rbd module addresses all devices under one major number.
///
/// # Errors
///
/// - [`BlockError::Exec`] if the module parameters cannot be queried
pub fn is_single_major(executor: &dyn Executor) -> Result<bool, Report<BlockError>> {
    let out = executor.execute_command_pipeline(SINGLE_MAJOR_ACTION, "modinfo -F parm rbd")?;
    Ok(out
        .lines()
        .any(|line| line.trim_start().starts_with(SINGLE_MAJOR_PARAM)))
}

/// Numeric id of `/dev/rbd<N>`.
pub fn device_id(device: &str) -> Result<u32, Report<BlockError>> {
    device
        .strip_prefix(DEVICE_PREFIX)
        .filter(|id| !id.is_empty() && id.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|id| id.parse().ok())
        .ok_or_else(|| {
            Report::new(BlockError::InvalidDevice {
                device: device.to_string(),
            })
        })
}

/// Control file that removes a device in the given addressing mode.
pub fn remove_node(sys_bus_path: &Path, single_major: bool) -> std::path::PathBuf {
    sys_bus_path.join(if single_major {
        REMOVE_SINGLE_MAJOR_NODE
    } else {
        REMOVE_NODE
    })
}

/// Asks the kernel to remove `/dev/rbd<id>`.
///
/// The control file must already exist; it is never created.
pub fn remove_device(
    sys_bus_path: &Path,
    id: u32,
    single_major: bool,
) -> Result<(), Report<BlockError>> {
    let path = remove_node(sys_bus_path, single_major);
    let control_error = |message: &str| BlockError::ControlFile {
        path: path.clone(),
        message: message.to_string(),
    };

    let mut file = OpenOptions::new()
        .write(true)
        .open(&path)
        .change_context_lazy(|| control_error("cannot open"))?;
    file.write_all(id.to_string().as_bytes())
        .change_context_lazy(|| control_error("cannot write device id"))?;
    Ok(())
}

/// Lists the images currently mapped, sorted by device id.
///
/// A missing `devices` directory means nothing is mapped.
pub fn list_mapped_images(sys_bus_path: &Path) -> Result<Vec<MappedImage>, Report<BlockError>> {
    let devices = sys_bus_path.join(DEVICES_DIR);
    let sys_bus_error = |message: String| BlockError::SysBus {
        path: devices.clone(),
        message,
    };

    let entries = match fs::read_dir(&devices) {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(Report::new(e).change_context(sys_bus_error("cannot list devices".into())))
        }
    };

    let mut images = Vec::new();
    for entry in entries {
        let entry = entry.change_context_lazy(|| sys_bus_error("cannot read entry".into()))?;
        let Some(id) = entry.file_name().to_str().and_then(|n| n.parse::<u32>().ok()) else {
            continue;
        };
        let read_attr = |attr: &str| {
            fs::read_to_string(entry.path().join(attr))
                .map(|value| value.trim().to_string())
                .change_context_lazy(|| sys_bus_error(format!("cannot read {attr} of device {id}")))
        };
        images.push(MappedImage {
            id,
            pool: read_attr("pool")?,
            name: read_attr("name")?,
        });
    }
    images.sort_by_key(|image| image.id);
    Ok(images)
}

#[cfg(test)]
mod tests {
    use similar_asserts::assert_eq;
    use tempfile::TempDir;

    use super::*;

    fn map_image(root: &Path, id: &str, pool: &str, name: &str) {
        let dir = root.join(DEVICES_DIR).join(id);
        fs::create_dir_all(&dir).expect("device dir");
        fs::write(dir.join("pool"), format!("{pool}\n")).expect("pool");
        fs::write(dir.join("name"), format!("{name}\n")).expect("name");
    }

    #[test]
    fn parses_device_ids() {
        assert_eq!(device_id("/dev/rbd4").expect("id"), 4);
        assert_eq!(device_id("/dev/rbd12").expect("id"), 12);
        for bad in ["/dev/rbd", "/dev/sda1", "/dev/rbd4p1", "rbd4", ""] {
            assert!(matches!(
                device_id(bad).expect_err("invalid").current_context(),
                BlockError::InvalidDevice { .. }
            ));
        }
    }

    #[test]
    fn lists_images_in_id_order() {
        let dir = TempDir::new().expect("tempdir");
        map_image(dir.path(), "10", "replicapool", "pvc-b");
        map_image(dir.path(), "2", "replicapool", "pvc-a");

        let images = list_mapped_images(dir.path()).expect("listed");
        assert_eq!(
            images,
            vec![
                MappedImage {
                    id: 2,
                    pool: "replicapool".to_string(),
                    name: "pvc-a".to_string()
                },
                MappedImage {
                    id: 10,
                    pool: "replicapool".to_string(),
                    name: "pvc-b".to_string()
                },
            ]
        );
        assert_eq!(images[1].device_path(), "/dev/rbd10");
    }

    #[test]
    fn no_devices_dir_means_nothing_mapped() {
        let dir = TempDir::new().expect("tempdir");
        assert!(list_mapped_images(dir.path()).expect("listed").is_empty());
    }

    #[test]
    fn remove_requires_existing_control_file() {
        let dir = TempDir::new().expect("tempdir");
        let report = remove_device(dir.path(), 3, false).expect_err("no control file");
        assert!(matches!(
            report.current_context(),
            BlockError::ControlFile { .. }
        ));
        assert!(!dir.path().join(REMOVE_NODE).exists());
    }
}
