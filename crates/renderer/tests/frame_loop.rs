//! Frame loop ordering against an in-memory GPU.

use std::collections::VecDeque;
use std::time::Duration;

use ash::vk;
use inflight_platform::FramebufferSignal;
use inflight_renderer::{
    AcquireOutcome, FrameBackend, FrameOrchestrator, FrameStatus, PresentOutcome, RebuildOutcome,
    RendererError, RendererResult, ResizeHandler, SwapchainChain,
};

#[derive(Clone, Debug, PartialEq, Eq)]
enum Call {
    Wait(usize),
    Acquire(usize),
    Reset(usize),
    Uniforms(usize),
    Record(usize, u32),
    Submit(usize),
    Present(usize, u32),
    Rebuild,
}

#[derive(Default)]
struct MockChain {
    created: Vec<(u32, u32)>,
    format: vk::Format,
    live: bool,
}

impl SwapchainChain for MockChain {
    fn wait_idle(&mut self) -> RendererResult<()> {
        Ok(())
    }

    fn destroy_chain(&mut self) {
        self.live = false;
    }

    fn create_swapchain(&mut self, size: (u32, u32)) -> RendererResult<vk::Format> {
        self.created.push(size);
        Ok(self.format)
    }

    fn pipeline_format(&self) -> vk::Format {
        self.format
    }

    fn rebuild_pipeline(&mut self, format: vk::Format) -> RendererResult<()> {
        self.format = format;
        Ok(())
    }

    fn create_framebuffers(&mut self) -> RendererResult<()> {
        self.live = true;
        Ok(())
    }
}

/// Signals every fence as soon as it is waited on.
struct MockGpu {
    calls: Vec<Call>,
    image_count: u32,
    next_image: u32,
    /// Submitted but not yet observed complete
    pending: Vec<bool>,
    acquire_script: VecDeque<AcquireOutcome>,
    present_script: VecDeque<PresentOutcome>,
    lost_slot: Option<usize>,
    chain: MockChain,
    size: FramebufferSignal,
    handler: ResizeHandler,
}

impl MockGpu {
    fn new(frames_in_flight: usize, image_count: u32) -> Self {
        Self {
            calls: Vec::new(),
            image_count,
            next_image: 0,
            pending: vec![false; frames_in_flight],
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
            lost_slot: None,
            chain: MockChain {
                format: vk::Format::B8G8R8A8_SRGB,
                live: true,
                ..Default::default()
            },
            size: FramebufferSignal::new((800, 600)),
            handler: ResizeHandler::new(Duration::ZERO),
        }
    }

    fn slots_waited(&self) -> Vec<usize> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Wait(slot) => Some(*slot),
                _ => None,
            })
            .collect()
    }

    fn count(&self, wanted: fn(&Call) -> bool) -> usize {
        self.calls.iter().filter(|call| wanted(call)).count()
    }
}

impl FrameBackend for MockGpu {
    fn wait_for_slot(&mut self, slot: usize) -> RendererResult<()> {
        self.calls.push(Call::Wait(slot));
        if self.lost_slot == Some(slot) {
            return Err(RendererError::DeviceLost {
                slot,
                timeout_ns: 1_000,
            });
        }
        self.pending[slot] = false;
        Ok(())
    }

    fn acquire_image(&mut self, slot: usize) -> RendererResult<AcquireOutcome> {
        self.calls.push(Call::Acquire(slot));
        assert!(self.chain.live, "acquire on a destroyed swapchain");

        if let Some(outcome) = self.acquire_script.pop_front() {
            return Ok(outcome);
        }
        let image_index = self.next_image;
        self.next_image = (self.next_image + 1) % self.image_count;
        Ok(AcquireOutcome::Acquired {
            image_index,
            suboptimal: false,
        })
    }

    fn reset_slot(&mut self, slot: usize) -> RendererResult<()> {
        assert!(
            !self.pending[slot],
            "slot {} reset while its previous submission is in flight",
            slot
        );
        self.calls.push(Call::Reset(slot));
        Ok(())
    }

    fn update_uniforms(&mut self, slot: usize) -> RendererResult<()> {
        assert!(!self.pending[slot], "uniforms of slot {} still in use", slot);
        self.calls.push(Call::Uniforms(slot));
        Ok(())
    }

    fn record(&mut self, slot: usize, image_index: u32) -> RendererResult<()> {
        self.calls.push(Call::Record(slot, image_index));
        Ok(())
    }

    fn submit(&mut self, slot: usize) -> RendererResult<()> {
        self.calls.push(Call::Submit(slot));
        self.pending[slot] = true;
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: u32) -> RendererResult<PresentOutcome> {
        self.calls.push(Call::Present(slot, image_index));
        Ok(self
            .present_script
            .pop_front()
            .unwrap_or(PresentOutcome::Presented))
    }

    fn rebuild_swapchain(&mut self) -> RendererResult<RebuildOutcome> {
        self.calls.push(Call::Rebuild);
        let size = self.size.clone();
        self.handler.rebuild(&mut self.chain, &size)
    }
}

#[test]
fn test_three_slots_over_ten_frames() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);

    for _ in 0..10 {
        let status = orchestrator.draw_frame(&mut gpu).unwrap();
        assert!(matches!(status, FrameStatus::Presented { .. }));
    }

    assert_eq!(gpu.slots_waited(), [0, 1, 2, 0, 1, 2, 0, 1, 2, 0]);
    assert_eq!(orchestrator.frame_counter(), 10);
    assert_eq!(orchestrator.current_slot(), 1);
}

#[test]
fn test_every_reset_follows_its_wait() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 3);

    for _ in 0..10 {
        orchestrator.draw_frame(&mut gpu).unwrap();
    }

    let mut last_wait: Option<usize> = None;
    for call in &gpu.calls {
        match call {
            Call::Wait(slot) => last_wait = Some(*slot),
            Call::Reset(slot) => {
                assert_eq!(last_wait, Some(*slot));
                last_wait = None;
            }
            _ => {}
        }
    }
}

#[test]
fn test_frame_step_order() {
    let mut orchestrator = FrameOrchestrator::new(2).unwrap();
    let mut gpu = MockGpu::new(2, 3);

    let status = orchestrator.draw_frame(&mut gpu).unwrap();

    assert_eq!(
        status,
        FrameStatus::Presented {
            slot: 0,
            image_index: 0
        }
    );
    assert_eq!(
        gpu.calls,
        [
            Call::Wait(0),
            Call::Acquire(0),
            Call::Reset(0),
            Call::Uniforms(0),
            Call::Record(0, 0),
            Call::Submit(0),
            Call::Present(0, 0),
        ]
    );
}

#[test]
fn test_first_k_frames_use_every_slot_once() {
    for k in 1..=4 {
        let mut orchestrator = FrameOrchestrator::new(k).unwrap();
        let mut gpu = MockGpu::new(k, 3);

        for _ in 0..k {
            orchestrator.draw_frame(&mut gpu).unwrap();
        }

        let mut waited = gpu.slots_waited();
        waited.sort_unstable();
        assert_eq!(waited, (0..k).collect::<Vec<_>>());
    }
}

#[test]
fn test_out_of_date_acquire_rebuilds_without_reset() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);
    gpu.acquire_script.push_back(AcquireOutcome::OutOfDate);

    let status = orchestrator.draw_frame(&mut gpu).unwrap();

    assert_eq!(status, FrameStatus::Rebuilt { presented: false });
    assert_eq!(gpu.calls, [Call::Wait(0), Call::Acquire(0), Call::Rebuild]);
    assert_eq!(orchestrator.frame_counter(), 0);
    assert_eq!(gpu.chain.created, [(800, 600)]);

    // The same slot is retried
    orchestrator.draw_frame(&mut gpu).unwrap();
    assert_eq!(gpu.slots_waited(), [0, 0]);
}

#[test]
fn test_suboptimal_acquire_presents_then_rebuilds() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);
    gpu.acquire_script.push_back(AcquireOutcome::Acquired {
        image_index: 1,
        suboptimal: true,
    });

    let status = orchestrator.draw_frame(&mut gpu).unwrap();

    assert_eq!(status, FrameStatus::Rebuilt { presented: true });
    assert_eq!(gpu.calls.last(), Some(&Call::Rebuild));
    assert!(gpu.calls.contains(&Call::Present(0, 1)));
    assert_eq!(orchestrator.frame_counter(), 1);
}

#[test]
fn test_stale_present_rebuilds() {
    for outcome in [PresentOutcome::OutOfDate, PresentOutcome::Suboptimal] {
        let mut orchestrator = FrameOrchestrator::new(3).unwrap();
        let mut gpu = MockGpu::new(3, 2);
        gpu.present_script.push_back(outcome);

        let status = orchestrator.draw_frame(&mut gpu).unwrap();

        assert_eq!(status, FrameStatus::Rebuilt { presented: true });
        assert_eq!(gpu.chain.created.len(), 1);
        assert_eq!(orchestrator.current_slot(), 1);
    }
}

#[test]
fn test_resize_flag_rebuilds_once() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);

    gpu.size.notify(1024, 768);
    orchestrator.request_resize();

    assert_eq!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Rebuilt { presented: true }
    );
    assert!(matches!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Presented { slot: 1, .. }
    ));
    assert_eq!(gpu.chain.created, [(1024, 768)]);
}

#[test]
fn test_minimized_window_suspends_until_resized() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);

    gpu.size.notify(0, 0);
    orchestrator.request_resize();

    assert_eq!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Suspended
    );
    assert!(orchestrator.is_suspended());

    // Still minimized: only the rebuild is retried, no slot is touched
    let before = gpu.calls.len();
    assert_eq!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Suspended
    );
    assert_eq!(&gpu.calls[before..], [Call::Rebuild]);
    assert!(gpu.chain.created.is_empty());

    gpu.size.notify(640, 480);
    assert!(matches!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Presented { slot: 1, .. }
    ));
    assert!(!orchestrator.is_suspended());
    assert_eq!(gpu.chain.created, [(640, 480)]);
}

#[test]
fn test_minimized_at_startup_builds_chain_on_restore() {
    let mut orchestrator = FrameOrchestrator::new(2).unwrap();
    let mut gpu = MockGpu::new(2, 2);
    gpu.chain.live = false;
    gpu.size.notify(0, 720);
    orchestrator.defer_rebuild();

    assert_eq!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Suspended
    );
    assert_eq!(gpu.calls, [Call::Rebuild]);
    assert!(gpu.chain.created.is_empty());

    gpu.size.notify(1024, 768);
    assert_eq!(
        orchestrator.draw_frame(&mut gpu).unwrap(),
        FrameStatus::Presented {
            slot: 0,
            image_index: 0
        }
    );
    assert_eq!(gpu.chain.created, [(1024, 768)]);
    assert!(!orchestrator.is_suspended());
}

#[test]
fn test_zero_dimension_never_creates_swapchain() {
    for size in [(0, 480), (640, 0), (0, 0)] {
        let mut orchestrator = FrameOrchestrator::new(2).unwrap();
        let mut gpu = MockGpu::new(2, 2);
        gpu.size.notify(size.0, size.1);
        gpu.acquire_script.push_back(AcquireOutcome::OutOfDate);

        assert_eq!(
            orchestrator.draw_frame(&mut gpu).unwrap(),
            FrameStatus::Suspended
        );
        assert!(gpu.chain.created.is_empty());
        assert!(gpu.chain.live);
    }
}

#[test]
fn test_repeated_rebuilds_keep_format() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);

    for _ in 0..3 {
        gpu.acquire_script.push_back(AcquireOutcome::OutOfDate);
        orchestrator.draw_frame(&mut gpu).unwrap();
        assert_eq!(gpu.chain.format, vk::Format::B8G8R8A8_SRGB);
    }
    assert_eq!(gpu.chain.created, [(800, 600); 3]);
}

#[test]
fn test_device_lost_is_fatal() {
    let mut orchestrator = FrameOrchestrator::new(3).unwrap();
    let mut gpu = MockGpu::new(3, 2);
    gpu.lost_slot = Some(1);

    orchestrator.draw_frame(&mut gpu).unwrap();
    let result = orchestrator.draw_frame(&mut gpu);

    assert!(matches!(
        result,
        Err(RendererError::DeviceLost { slot: 1, .. })
    ));
    assert_eq!(gpu.count(|c| matches!(c, Call::Acquire(1))), 0);
    assert_eq!(orchestrator.frame_counter(), 1);
}
