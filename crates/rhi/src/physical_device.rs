//! Physical device (GPU) selection.
//!
//! This module handles GPU enumeration and selection based on capabilities.
//!
//! # Overview
//!
//! A GPU qualifies when all of the following hold:
//! 1. A queue family supports graphics operations
//! 2. A queue family (possibly the same one) can present to the target surface
//! 3. Every entry of [`REQUIRED_DEVICE_EXTENSIONS`] is available
//! 4. The surface reports at least one format and one present mode
//!
//! Among qualifying GPUs the highest [`rate_device`] score wins, so a discrete
//! GPU is picked over an integrated one.
//!
//! # Example
//!
//! ```no_run
//! use inflight_rhi::instance::Instance;
//! use inflight_rhi::physical_device::{PresentTarget, select_physical_device};
//! use ash::vk;
//!
//! let instance = Instance::new(c"demo", false, None).expect("Failed to create instance");
//! // Assume surface is created from a window
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // placeholder
//! let loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());
//!
//! let device_info = select_physical_device(
//!     instance.handle(),
//!     Some(PresentTarget { surface, loader: &loader }),
//! )
//! .expect("Failed to select physical device");
//!
//! println!("Selected GPU: {:?}", device_info.device_name());
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::RhiError;

/// Device extensions every presentable device must expose.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Surface a selected device must be able to present to.
#[derive(Clone, Copy)]
pub struct PresentTarget<'a> {
    pub surface: vk::SurfaceKHR,
    pub loader: &'a ash::khr::surface::Instance,
}

/// Queue family indices for the graphics and present queues.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    /// Index of the queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the queue family that supports presentation to a surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both graphics and present families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the unique queue family indices.
    ///
    /// Used when creating the logical device so the same family is not
    /// requested twice.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);

        if let Some(graphics) = self.graphics_family {
            families.push(graphics);
        }
        if let Some(present) = self.present_family
            && !families.contains(&present)
        {
            families.push(present);
        }

        families
    }

    /// Returns true when graphics and present live in different families.
    ///
    /// Swapchain images must then use concurrent sharing.
    pub fn is_split(&self) -> bool {
        self.graphics_family != self.present_family
    }
}

/// Information about a physical device (GPU).
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Vulkan physical device handle.
    pub device: vk::PhysicalDevice,
    /// Device properties (name, limits, API version, etc.).
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Memory properties (heap sizes, memory types).
    pub memory_properties: vk::PhysicalDeviceMemoryProperties,
    /// Queue family indices for graphics and present.
    pub queue_families: QueueFamilyIndices,
    /// Whether `VK_KHR_portability_subset` must be enabled on the device.
    pub portability_subset: bool,
}

impl PhysicalDeviceInfo {
    /// Returns the device name as a string.
    pub fn device_name(&self) -> &str {
        self.properties
            .device_name_as_c_str()
            .ok()
            .and_then(|name| name.to_str().ok())
            .unwrap_or("Unknown Device")
    }

    /// Returns a human-readable string for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            _ => "Other",
        }
    }

    /// Returns the Vulkan API version supported by the device.
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }

    /// Returns the total device local memory in bytes.
    pub fn device_local_memory(&self) -> u64 {
        self.memory_properties
            .memory_heaps
            .iter()
            .take(self.memory_properties.memory_heap_count as usize)
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size)
            .sum()
    }
}

impl std::fmt::Debug for PhysicalDeviceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (major, minor, patch) = self.api_version();
        f.debug_struct("PhysicalDeviceInfo")
            .field("name", &self.device_name())
            .field("type", &self.device_type_name())
            .field("api_version", &format!("{}.{}.{}", major, minor, patch))
            .field("queue_families", &self.queue_families)
            .finish()
    }
}

/// Selects the most suitable physical device for rendering.
///
/// With `target = None` only a graphics queue is required and the present
/// family mirrors it. This is the headless path used by tests.
///
/// # Errors
///
/// Returns [`RhiError::NoSuitableGpu`] if no GPU qualifies.
pub fn select_physical_device(
    instance: &ash::Instance,
    target: Option<PresentTarget<'_>>,
) -> Result<PhysicalDeviceInfo, RhiError> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    if devices.is_empty() {
        warn!("No Vulkan-capable GPUs found");
        return Err(RhiError::NoSuitableGpu);
    }

    info!("Found {} GPU(s)", devices.len());

    let mut best: Option<(PhysicalDeviceInfo, u64)> = None;

    for device in devices {
        let Some(info) = check_device_suitability(instance, device, target) else {
            continue;
        };
        let score = rate_device(&info);
        debug!(
            "GPU '{}' ({}) - Score: {}",
            info.device_name(),
            info.device_type_name(),
            score
        );
        // Strictly greater: the first of equally rated devices is kept.
        if best.as_ref().is_none_or(|(_, best_score)| score > *best_score) {
            best = Some((info, score));
        }
    }

    let Some((selected_device, score)) = best else {
        warn!("No suitable GPU found with required capabilities");
        return Err(RhiError::NoSuitableGpu);
    };

    let (major, minor, patch) = selected_device.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}, Score: {}",
        selected_device.device_name(),
        selected_device.device_type_name(),
        major,
        minor,
        patch,
        score
    );

    Ok(selected_device)
}

/// Checks if a physical device qualifies for rendering.
///
/// Returns `None` as soon as one requirement fails. There is no partial credit.
fn check_device_suitability(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    target: Option<PresentTarget<'_>>,
) -> Option<PhysicalDeviceInfo> {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let memory_properties = unsafe { instance.get_physical_device_memory_properties(device) };

    let device_name = properties
        .device_name_as_c_str()
        .ok()
        .and_then(|name| name.to_str().ok())
        .unwrap_or("Unknown")
        .to_owned();

    let queue_families = find_queue_families(instance, device, target);

    if !queue_families.is_complete() {
        debug!(
            "GPU '{}' skipped: missing required queue families (graphics={}, present={})",
            device_name,
            queue_families.graphics_family.is_some(),
            queue_families.present_family.is_some()
        );
        return None;
    }

    let available = match unsafe { instance.enumerate_device_extension_properties(device) } {
        Ok(extensions) => extensions,
        Err(e) => {
            debug!("GPU '{}' skipped: extension query failed: {}", device_name, e);
            return None;
        }
    };
    let available_names: Vec<&CStr> = available
        .iter()
        .filter_map(|ext| ext.extension_name_as_c_str().ok())
        .collect();

    let portability_subset = available_names.contains(&ash::khr::portability_subset::NAME);

    if let Some(target) = target {
        if let Some(missing) = missing_extension(&available_names, REQUIRED_DEVICE_EXTENSIONS) {
            debug!(
                "GPU '{}' skipped: missing extension {:?}",
                device_name, missing
            );
            return None;
        }

        if !has_adequate_surface_support(device, target) {
            debug!(
                "GPU '{}' skipped: no surface formats or present modes",
                device_name
            );
            return None;
        }
    }

    Some(PhysicalDeviceInfo {
        device,
        properties,
        features,
        memory_properties,
        queue_families,
        portability_subset,
    })
}

/// Returns the first entry of `required` that is not in `available`.
pub fn missing_extension<'a>(available: &[&CStr], required: &[&'a CStr]) -> Option<&'a CStr> {
    required
        .iter()
        .copied()
        .find(|name| !available.contains(name))
}

fn has_adequate_surface_support(device: vk::PhysicalDevice, target: PresentTarget<'_>) -> bool {
    let formats = unsafe {
        target
            .loader
            .get_physical_device_surface_formats(device, target.surface)
    };
    let present_modes = unsafe {
        target
            .loader
            .get_physical_device_surface_present_modes(device, target.surface)
    };

    matches!((formats, present_modes), (Ok(f), Ok(p)) if !f.is_empty() && !p.is_empty())
}

/// Finds the graphics and present queue families.
///
/// A family that supports both is preferred so the two queues coincide.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    target: Option<PresentTarget<'_>>,
) -> QueueFamilyIndices {
    let queue_families = unsafe { instance.get_physical_device_queue_family_properties(device) };

    let supports_present = |index: u32| match target {
        Some(target) => unsafe {
            target
                .loader
                .get_physical_device_surface_support(device, index, target.surface)
                .unwrap_or(false)
        },
        None => true,
    };

    let flags: Vec<(vk::QueueFlags, bool)> = queue_families
        .iter()
        .enumerate()
        .map(|(i, family)| {
            let usable = family.queue_count > 0;
            (
                if usable {
                    family.queue_flags
                } else {
                    vk::QueueFlags::empty()
                },
                usable && supports_present(i as u32),
            )
        })
        .collect();

    pick_queue_families(&flags)
}

/// Picks queue families from `(flags, present_support)` pairs, one per family.
pub fn pick_queue_families(families: &[(vk::QueueFlags, bool)]) -> QueueFamilyIndices {
    let mut indices = QueueFamilyIndices::default();

    for (i, &(flags, present)) in families.iter().enumerate() {
        let i = i as u32;
        let graphics = flags.contains(vk::QueueFlags::GRAPHICS);

        if graphics && present {
            return QueueFamilyIndices {
                graphics_family: Some(i),
                present_family: Some(i),
            };
        }
        if graphics && indices.graphics_family.is_none() {
            indices.graphics_family = Some(i);
        }
        if present && indices.present_family.is_none() {
            indices.present_family = Some(i);
        }
    }

    indices
}

/// Rates a qualifying physical device. Higher is better.
///
/// Device type dominates; device-local memory only separates devices of the
/// same type.
pub fn rate_device(info: &PhysicalDeviceInfo) -> u64 {
    let type_score: u64 = match info.properties.device_type {
        vk::PhysicalDeviceType::DISCRETE_GPU => 10000,
        vk::PhysicalDeviceType::INTEGRATED_GPU => 1000,
        vk::PhysicalDeviceType::VIRTUAL_GPU => 100,
        vk::PhysicalDeviceType::CPU => 10,
        _ => 1,
    };

    // VRAM in MB, capped below the gap between device types
    let vram_mb = (info.device_local_memory() / (1024 * 1024)).min(99_999);

    type_score * 100_000 + vram_mb
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_with(device_type: vk::PhysicalDeviceType, vram_mb: u64) -> PhysicalDeviceInfo {
        let mut memory_properties = vk::PhysicalDeviceMemoryProperties {
            memory_heap_count: 1,
            ..Default::default()
        };
        memory_properties.memory_heaps[0] = vk::MemoryHeap {
            size: vram_mb * 1024 * 1024,
            flags: vk::MemoryHeapFlags::DEVICE_LOCAL,
        };

        PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties {
                device_type,
                ..Default::default()
            },
            features: vk::PhysicalDeviceFeatures::default(),
            memory_properties,
            queue_families: QueueFamilyIndices {
                graphics_family: Some(0),
                present_family: Some(0),
            },
            portability_subset: false,
        }
    }

    #[test]
    fn test_queue_family_indices_default() {
        let indices = QueueFamilyIndices::default();
        assert!(indices.graphics_family.is_none());
        assert!(indices.present_family.is_none());
        assert!(!indices.is_complete());
    }

    #[test]
    fn test_unique_families_with_duplicates() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(0),
        };
        assert_eq!(indices.unique_families(), vec![0]);
        assert!(!indices.is_split());
    }

    #[test]
    fn test_unique_families_split() {
        let indices = QueueFamilyIndices {
            graphics_family: Some(0),
            present_family: Some(2),
        };
        assert_eq!(indices.unique_families(), vec![0, 2]);
        assert!(indices.is_split());
    }

    #[test]
    fn test_pick_prefers_family_with_both() {
        let families = [
            (vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE, false),
            (vk::QueueFlags::TRANSFER, true),
            (vk::QueueFlags::GRAPHICS, true),
        ];
        let indices = pick_queue_families(&families);
        assert_eq!(indices.graphics_family, Some(2));
        assert_eq!(indices.present_family, Some(2));
    }

    #[test]
    fn test_pick_falls_back_to_separate_families() {
        let families = [
            (vk::QueueFlags::GRAPHICS, false),
            (vk::QueueFlags::TRANSFER, true),
        ];
        let indices = pick_queue_families(&families);
        assert_eq!(indices.graphics_family, Some(0));
        assert_eq!(indices.present_family, Some(1));
        assert!(indices.is_complete());
    }

    #[test]
    fn test_pick_without_graphics_is_incomplete() {
        let families = [(vk::QueueFlags::COMPUTE, true)];
        assert!(!pick_queue_families(&families).is_complete());
    }

    #[test]
    fn test_missing_extension() {
        let available = [ash::khr::swapchain::NAME, c"VK_KHR_maintenance1"];
        assert_eq!(missing_extension(&available, REQUIRED_DEVICE_EXTENSIONS), None);

        let available = [c"VK_KHR_maintenance1"];
        assert_eq!(
            missing_extension(&available, REQUIRED_DEVICE_EXTENSIONS),
            Some(ash::khr::swapchain::NAME)
        );
    }

    #[test]
    fn test_discrete_beats_integrated_regardless_of_memory() {
        let discrete = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 256);
        let integrated = info_with(vk::PhysicalDeviceType::INTEGRATED_GPU, 32 * 1024);
        assert!(rate_device(&discrete) > rate_device(&integrated));
    }

    #[test]
    fn test_memory_breaks_ties_within_type() {
        let small = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 2);
        let large = info_with(vk::PhysicalDeviceType::DISCRETE_GPU, 8 * 1024);
        assert!(rate_device(&large) > rate_device(&small));
    }
}
