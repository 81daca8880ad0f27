use vulkanalia::prelude::v1_0::*;
use anyhow::{anyhow, Result};

/// The maximum number of frames that may be recorded on the
/// CPU while the GPU is still working on earlier ones.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

// Each frame slot owns the synchronization objects for one
// in-flight frame:
//  - Image available semaphore: signaled by the presentation
//    engine when the acquired image is actually free to be
//    rendered to
//  - Render finished semaphore: signaled by the graphics queue
//    when all draw commands for the frame have executed
//  - In-flight fence: signaled together with the render
//    finished semaphore, but waitable from the CPU, so that
//    the host never starts re-recording a slot the GPU is
//    still consuming
//
// Note that the slots are indexed by the frame counter, not by
// the swapchain image index: the presentation engine hands out
// images in an order of its own, so per-image semaphores could
// end up waited on while a previous acquisition still holds
// them.

/// Synchronization objects for a single in-flight frame slot.
#[derive(Default, Clone, Copy)]
pub struct FrameSync {
    /// Semaphore signaled when the acquired swapchain image is
    /// ready to be rendered to.
    pub image_available_semaphore: vk::Semaphore,
    /// Semaphore signaled when rendering has finished and
    /// presentation can happen.
    pub render_finished_semaphore: vk::Semaphore,
    /// Fence signaled when the draw commands of this slot have
    /// completed on the device.
    pub in_flight_fence: vk::Fence,
}

impl FrameSync {
    pub unsafe fn create(device: &Device) -> Result<Self> {
        // Fences are created in the signaled state: the very
        // first wait on each slot would otherwise block
        // forever, since no submission has ever signaled it.
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        let fence_info = vk::FenceCreateInfo::builder()
            .flags(vk::FenceCreateFlags::SIGNALED);

        Ok(Self {
            image_available_semaphore: device.create_semaphore(&semaphore_info, None)?,
            render_finished_semaphore: device.create_semaphore(&semaphore_info, None)?,
            in_flight_fence: device.create_fence(&fence_info, None)?,
        })
    }

    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_semaphore(self.image_available_semaphore, None);
        device.destroy_semaphore(self.render_finished_semaphore, None);
        device.destroy_fence(self.in_flight_fence, None);
    }
}

/// Outcome of an acquire or present operation on the
/// swapchain. Fatal driver errors are not represented here;
/// they are propagated as hard errors instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The swapchain still matches the surface.
    Adequate,
    /// The frame can still be rendered and presented, but the
    /// surface properties no longer match exactly; rebuilding
    /// is advisable.
    Suboptimal,
    /// The swapchain is incompatible with the surface; the
    /// frame must be abandoned and the swapchain rebuilt.
    OutOfDate,
}

impl FrameStatus {
    /// Whether the swapchain should be rebuilt after the frame
    /// has been presented (or abandoned).
    pub fn needs_rebuild(self) -> bool {
        self != FrameStatus::Adequate
    }
}

// The frame tracker is the CPU-side half of the frame pacing
// state machine: it knows whether a frame is currently open
// for recording and which in-flight slot it belongs to. It
// holds no Vulkan handles, so the whole begin/end protocol can
// be exercised without a device.

/// Tracks the begin/end protocol of frames and the in-flight
/// slot index.
pub struct FrameTracker {
    frame_index: usize,
    frame_started: bool,
}

impl FrameTracker {
    pub fn new() -> Self {
        Self {
            frame_index: 0,
            frame_started: false,
        }
    }

    /// The slot index of the frame currently being recorded,
    /// cycling through `0..MAX_FRAMES_IN_FLIGHT`.
    pub fn frame_index(&self) -> usize {
        self.frame_index
    }

    pub fn in_progress(&self) -> bool {
        self.frame_started
    }

    /// Marks a frame as open for recording. Opening a second
    /// frame before the first is closed is a programming
    /// error, and fails fast rather than silently proceeding.
    pub fn begin(&mut self) -> Result<()> {
        if self.frame_started {
            return Err(anyhow!("Cannot begin a frame while another is in progress."));
        }

        self.frame_started = true;
        Ok(())
    }

    /// Closes the current frame and advances the slot index.
    /// The advance is unconditional: even if presentation
    /// reported the swapchain stale and a rebuild follows, the
    /// pacing counter keeps cycling modulo the slot count.
    pub fn end(&mut self) -> Result<()> {
        if !self.frame_started {
            return Err(anyhow!("Cannot end a frame while none is in progress."));
        }

        self.frame_started = false;
        self.frame_index = (self.frame_index + 1) % MAX_FRAMES_IN_FLIGHT;
        Ok(())
    }
}

// A swapchain cannot be built over a surface with no drawable
// area, which is what a minimized window reports. The gate
// remembers that a rebuild was asked for while the extent was
// zero, so the renderer can retry on later frames; the first
// request at a nonzero extent clears it and proceeds.

/// Decides whether a swapchain rebuild may proceed at the
/// given extent or must be deferred until the window has a
/// drawable area again.
pub struct RebuildGate {
    pending: bool,
}

impl RebuildGate {
    pub fn new() -> Self {
        Self { pending: false }
    }

    /// Whether a deferred rebuild is still waiting for a
    /// nonzero extent.
    pub fn pending(&self) -> bool {
        self.pending
    }

    /// Requests a rebuild at the given extent. Returns `true`
    /// if the rebuild should happen now, or `false` if it has
    /// been deferred because the extent is zero.
    pub fn request(&mut self, extent: vk::Extent2D) -> bool {
        if extent.width == 0 || extent.height == 0 {
            self.pending = true;
            false
        } else {
            self.pending = false;
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_twice_fails() {
        let mut tracker = FrameTracker::new();
        tracker.begin().unwrap();
        assert!(tracker.begin().is_err());
    }

    #[test]
    fn end_without_begin_fails() {
        let mut tracker = FrameTracker::new();
        assert!(tracker.end().is_err());

        tracker.begin().unwrap();
        tracker.end().unwrap();
        assert!(tracker.end().is_err());
    }

    #[test]
    fn frame_index_cycles_modulo_slot_count() {
        let mut tracker = FrameTracker::new();
        let mut seen = Vec::new();

        for _ in 0..3 * MAX_FRAMES_IN_FLIGHT {
            seen.push(tracker.frame_index());
            tracker.begin().unwrap();
            tracker.end().unwrap();
        }

        let expected = (0..3 * MAX_FRAMES_IN_FLIGHT)
            .map(|i| i % MAX_FRAMES_IN_FLIGHT)
            .collect::<Vec<_>>();
        assert_eq!(seen, expected);
    }

    #[test]
    fn abandoned_frames_do_not_advance_the_index() {
        // An acquire returning out-of-date never opens the
        // frame, so the same slot is retried after rebuilding.
        let mut tracker = FrameTracker::new();
        tracker.begin().unwrap();
        tracker.end().unwrap();
        assert_eq!(tracker.frame_index(), 1);

        // Simulated failed acquire: no begin, no end.
        assert_eq!(tracker.frame_index(), 1);

        tracker.begin().unwrap();
        tracker.end().unwrap();
        assert_eq!(tracker.frame_index(), 0);
    }

    #[test]
    fn rebuilds_never_desynchronize_the_index() {
        // Scripted presentation outcomes across several frames;
        // each stale status stands for a swapchain rebuild
        // happening between end and the next begin. The slot
        // index keeps its plain modular sequence throughout.
        let statuses = [
            FrameStatus::Adequate,
            FrameStatus::OutOfDate,
            FrameStatus::Suboptimal,
            FrameStatus::Adequate,
            FrameStatus::OutOfDate,
        ];

        let mut tracker = FrameTracker::new();
        for (i, status) in statuses.iter().enumerate() {
            assert_eq!(tracker.frame_index(), i % MAX_FRAMES_IN_FLIGHT);
            tracker.begin().unwrap();
            tracker.end().unwrap();

            if status.needs_rebuild() {
                // The rebuild replaces the swapchain, not the
                // tracker; nothing to reset here.
            }
        }

        assert_eq!(tracker.frame_index(), statuses.len() % MAX_FRAMES_IN_FLIGHT);
    }

    #[test]
    fn zero_extent_rebuild_waits_for_a_drawable_area() {
        let zero = vk::Extent2D { width: 0, height: 0 };
        let full = vk::Extent2D { width: 1280, height: 720 };

        // A rebuild requested while minimized is deferred, and
        // stays deferred however many frames go by at zero
        // extent.
        let mut gate = RebuildGate::new();
        assert!(!gate.request(zero));
        assert!(gate.pending());
        assert!(!gate.request(zero));
        assert!(gate.pending());

        // The first request at a nonzero extent performs the
        // rebuild and clears the deferral, so nothing retries
        // it again afterwards.
        assert!(gate.request(full));
        assert!(!gate.pending());
    }

    #[test]
    fn immediate_rebuild_leaves_nothing_pending() {
        let full = vk::Extent2D { width: 800, height: 600 };

        let mut gate = RebuildGate::new();
        assert!(gate.request(full));
        assert!(!gate.pending());
    }

    #[test]
    fn rebuild_statuses() {
        assert!(!FrameStatus::Adequate.needs_rebuild());
        assert!(FrameStatus::Suboptimal.needs_rebuild());
        assert!(FrameStatus::OutOfDate.needs_rebuild());
    }
}
