use std::path::Path;

use error_stack::Report;
use tracing::info;
use tracing::warn;

use crate::error::BlockError;
use crate::exec::shell_quote;
use crate::exec::Executor;
use crate::rbd;

pub const GET_DEVICE_ACTION: &str = "get device from mount point";
pub const UNMOUNT_ACTION: &str = "unmount";

/// Unmounts `mount_path` (if given) and removes its rbd device.
///
/// `device_path` is resolved from `mount_path` when empty. Runs once; the
/// first failing step is returned as is.
///
/// # Errors
///
/// - [`BlockError::Validation`] if both paths are empty
/// - [`BlockError::Exec`] if resolving the device, querying the rbd module
///   or unmounting fails
/// - [`BlockError::InvalidDevice`] if the device is not `/dev/rbd<N>`
/// - [`BlockError::ControlFile`] if the removal cannot be written
pub fn unmount_block(
    device_path: &str,
    mount_path: &str,
    sys_bus_path: &Path,
    executor: &dyn Executor,
) -> Result<String, Report<BlockError>> {
    if device_path.is_empty() && mount_path.is_empty() {
        return Err(Report::new(BlockError::Validation {
            message: "device path or mount path is required".to_string(),
        }));
    }

    let device = if device_path.is_empty() {
        device_from_mount_point(mount_path, executor)?
    } else {
        device_path.to_string()
    };

    let single_major = rbd::is_single_major(executor)?;
    let id = rbd::device_id(&device)?;

    if !mount_path.is_empty() {
        executor.execute_command_pipeline(
            UNMOUNT_ACTION,
            &format!("umount {}", shell_quote(mount_path)),
        )?;
    }

    match rbd::list_mapped_images(sys_bus_path) {
        Ok(images) => match images.iter().find(|image| image.id == id) {
            Some(image) => info!(
                "removing rbd device {device} (image {}/{})",
                image.pool, image.name
            ),
            None => warn!("rbd device {device} has no mapped image"),
        },
        Err(report) => warn!("failed to list mapped rbd images: {report:?}"),
    }

    rbd::remove_device(sys_bus_path, id, single_major)?;

    Ok(format!(
        "succeeded removing rbd device {device} from '{mount_path}'"
    ))
}

fn device_from_mount_point(
    mount_path: &str,
    executor: &dyn Executor,
) -> Result<String, Report<BlockError>> {
    let mount_path = match mount_path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    };
    let out = executor.execute_command_pipeline(
        GET_DEVICE_ACTION,
        &format!("mount | grep {}", shell_quote(&format!("on {mount_path} type"))),
    )?;

    out.split_whitespace()
        .next()
        .map(str::to_string)
        .ok_or_else(|| {
            Report::new(BlockError::Exec {
                action: GET_DEVICE_ACTION.to_string(),
                message: format!("no device mounted at {mount_path}"),
            })
        })
}
