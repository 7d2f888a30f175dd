//! Staging uploads into device-local memory.
//!
//! Every upload goes through a host-visible staging buffer and a one-time
//! command buffer that copies into the destination. The call blocks until
//! the copy has finished, after which the staging buffer is dropped.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use inflight_rhi::buffer::BufferUsage;
//! use inflight_rhi::command::CommandPool;
//! use inflight_rhi::device::Device;
//! use inflight_rhi::upload::upload_buffer;
//!
//! # fn example(device: Arc<Device>, pool: &CommandPool) -> Result<(), inflight_rhi::RhiError> {
//! let indices: [u32; 6] = [0, 1, 2, 2, 3, 0];
//! let index_buffer = upload_buffer(&device, pool, BufferUsage::Index, bytemuck::cast_slice(&indices))?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::buffer::{Buffer, BufferUsage};
use crate::command::{CommandPool, one_time_submit};
use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// Uploads `data` into a new device-local buffer of kind `usage`.
///
/// # Errors
///
/// Returns an error if `data` is empty, `usage` is host-visible, or any
/// allocation, recording, or submission step fails.
pub fn upload_buffer(
    device: &Arc<Device>,
    pool: &CommandPool,
    usage: BufferUsage,
    data: &[u8],
) -> RhiResult<Buffer> {
    if usage.is_host_visible() {
        return Err(RhiError::InvalidArgument(format!(
            "{} buffers are host-visible and need no staging",
            usage.name()
        )));
    }

    let staging = Buffer::new_with_data(device.clone(), BufferUsage::Staging, data)?;
    let destination = Buffer::new(device.clone(), usage, staging.size())?;

    one_time_submit(device, pool, |cmd| {
        let region = vk::BufferCopy::default().size(staging.size());
        cmd.copy_buffer(staging.handle(), destination.handle(), &[region]);
        Ok(())
    })?;

    debug!("Uploaded {} bytes into {} buffer", data.len(), usage.name());

    Ok(destination)
}

/// Copies a device buffer back to host memory.
///
/// Blocks on the copy. Meant for verification, not for the frame loop.
///
/// # Errors
///
/// Returns an error if the readback buffer cannot be created or the copy
/// fails.
pub fn read_back(device: &Arc<Device>, pool: &CommandPool, source: &Buffer) -> RhiResult<Vec<u8>> {
    let readback = Buffer::new(device.clone(), BufferUsage::Readback, source.size())?;

    one_time_submit(device, pool, |cmd| {
        let region = vk::BufferCopy::default().size(source.size());
        cmd.copy_buffer(source.handle(), readback.handle(), &[region]);
        Ok(())
    })?;

    readback.read_data()
}
