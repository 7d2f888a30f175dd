//! Per-swapchain-image framebuffers.
//!
//! One framebuffer exists per swapchain image. Each references that image's
//! view together with the shared depth and MSAA attachments, in the order
//! the render pass declares them.

use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::attachment::FrameAttachments;
use crate::device::Device;
use crate::error::RhiResult;

/// Orders views to match the render pass attachment indices.
///
/// Without MSAA the swapchain view is drawn to directly; with MSAA it is
/// the resolve target after the multisampled color and depth views.
pub fn attachment_views(
    swapchain_view: vk::ImageView,
    depth_view: vk::ImageView,
    msaa_color_view: Option<vk::ImageView>,
) -> Vec<vk::ImageView> {
    match msaa_color_view {
        Some(color_view) => vec![color_view, depth_view, swapchain_view],
        None => vec![swapchain_view, depth_view],
    }
}

/// The framebuffers of one swapchain generation.
pub struct Framebuffers {
    device: Arc<Device>,
    framebuffers: Vec<vk::Framebuffer>,
    extent: vk::Extent2D,
}

impl Framebuffers {
    /// Creates one framebuffer per swapchain image view.
    ///
    /// # Errors
    ///
    /// Returns an error if any creation fails. Framebuffers created before
    /// the failure are destroyed.
    pub fn new(
        device: Arc<Device>,
        render_pass: vk::RenderPass,
        swapchain_views: &[vk::ImageView],
        attachments: &FrameAttachments,
        extent: vk::Extent2D,
    ) -> RhiResult<Self> {
        let mut created = Self {
            device,
            framebuffers: Vec::with_capacity(swapchain_views.len()),
            extent,
        };

        for &view in swapchain_views {
            let views = attachment_views(view, attachments.depth_view(), attachments.color_view());
            let create_info = vk::FramebufferCreateInfo::default()
                .render_pass(render_pass)
                .attachments(&views)
                .width(extent.width)
                .height(extent.height)
                .layers(1);

            let framebuffer = unsafe {
                created
                    .device
                    .handle()
                    .create_framebuffer(&create_info, None)?
            };
            created.framebuffers.push(framebuffer);
        }

        debug!(
            "Created {} framebuffer(s) at {}x{}",
            created.framebuffers.len(),
            extent.width,
            extent.height
        );

        Ok(created)
    }

    /// Framebuffer for swapchain image `image_index`.
    #[inline]
    pub fn get(&self, image_index: u32) -> Option<vk::Framebuffer> {
        self.framebuffers.get(image_index as usize).copied()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.framebuffers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.framebuffers.is_empty()
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }
}

impl Drop for Framebuffers {
    fn drop(&mut self) {
        unsafe {
            for &framebuffer in &self.framebuffers {
                self.device.handle().destroy_framebuffer(framebuffer, None);
            }
        }
        debug!("Destroyed {} framebuffer(s)", self.framebuffers.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn view(raw: u64) -> vk::ImageView {
        vk::ImageView::from_raw(raw)
    }

    #[test]
    fn test_single_sample_view_order() {
        let views = attachment_views(view(1), view(2), None);
        assert_eq!(views, vec![view(1), view(2)]);
    }

    #[test]
    fn test_multisampled_view_order() {
        let views = attachment_views(view(1), view(2), Some(view(3)));
        assert_eq!(views, vec![view(3), view(2), view(1)]);
    }
}
