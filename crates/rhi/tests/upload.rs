//! Staging upload tests against a real device.
//!
//! Every test returns early when no Vulkan implementation is available.

use std::sync::Arc;

use inflight_rhi::RhiError;
use inflight_rhi::buffer::BufferUsage;
use inflight_rhi::command::CommandPool;
use inflight_rhi::device::Device;
use inflight_rhi::instance::Instance;
use inflight_rhi::physical_device::select_physical_device;
use inflight_rhi::upload::{read_back, upload_buffer};
use inflight_rhi::vk;

fn headless_device() -> Option<(Instance, Arc<Device>)> {
    let instance = match Instance::new(c"upload-test", false, None) {
        Ok(instance) => instance,
        Err(RhiError::LoadingError(_)) => {
            eprintln!("Skipping test: Vulkan not available");
            return None;
        }
        Err(RhiError::VulkanError(e)) => {
            eprintln!("Skipping test: instance creation failed ({:?})", e);
            return None;
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
    };

    let info = match select_physical_device(instance.handle(), None) {
        Ok(info) => info,
        Err(RhiError::NoSuitableGpu) => {
            eprintln!("Skipping test: no GPU with a graphics queue");
            return None;
        }
        Err(e) => panic!("Unexpected error: {:?}", e),
    };

    let device = Device::new(&instance, &info, false).expect("device creation");
    Some((instance, device))
}

#[test]
fn test_uploaded_bytes_read_back_unchanged() {
    let Some((_instance, device)) = headless_device() else {
        return;
    };
    let pool = CommandPool::new(device.clone(), device.graphics_family()).unwrap();

    // Odd length and a non-repeating pattern catch truncation and reordering
    let source: Vec<u8> = (0..4099u32).map(|i| (i.wrapping_mul(31) % 251) as u8).collect();

    let buffer = upload_buffer(&device, &pool, BufferUsage::Vertex, &source).unwrap();
    assert_eq!(buffer.size(), source.len() as vk::DeviceSize);

    let copied = read_back(&device, &pool, &buffer).unwrap();
    assert_eq!(copied, source);
}

#[test]
fn test_index_upload_round_trip() {
    let Some((_instance, device)) = headless_device() else {
        return;
    };
    let pool = CommandPool::new(device.clone(), device.graphics_family()).unwrap();

    let indices: [u32; 6] = [0, 1, 2, 2, 3, 0];
    let buffer = upload_buffer(
        &device,
        &pool,
        BufferUsage::Index,
        bytemuck::cast_slice(&indices),
    )
    .unwrap();

    let copied = read_back(&device, &pool, &buffer).unwrap();
    assert_eq!(bytemuck::pod_collect_to_vec::<u8, u32>(&copied), indices);
}

#[test]
fn test_empty_upload_is_rejected() {
    let Some((_instance, device)) = headless_device() else {
        return;
    };
    let pool = CommandPool::new(device.clone(), device.graphics_family()).unwrap();

    let result = upload_buffer(&device, &pool, BufferUsage::Vertex, &[]);
    assert!(matches!(result, Err(RhiError::InvalidArgument(_))));
}

#[test]
fn test_host_visible_usage_is_rejected() {
    let Some((_instance, device)) = headless_device() else {
        return;
    };
    let pool = CommandPool::new(device.clone(), device.graphics_family()).unwrap();

    let result = upload_buffer(&device, &pool, BufferUsage::Uniform, &[1, 2, 3, 4]);
    assert!(matches!(result, Err(RhiError::InvalidArgument(_))));
}
