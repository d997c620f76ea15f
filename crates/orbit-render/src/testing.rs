// SPDX-License-Identifier: CEPL-1.0
//! In-memory [`FrameDevice`] that models fence states and logs every call.
//!
//! Protocol violations a GPU would punish (writing a slot that is still in
//! flight, waiting on a fence nothing will signal, using a signal from a
//! previous swapchain) come back as errors so tests fail loudly.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use anyhow::{bail, Result};

use crate::{
    Acquire, FrameDevice, FrameSlot, FrameUniforms, ImageIndex, Present, RenderSize, SurfaceInfo,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    CreateFrame(FrameSlot),
    CreateImageSignal { image: ImageIndex, generation: u32 },
    Wait(FrameSlot),
    Acquire(FrameSlot),
    Reset(FrameSlot),
    WriteUniforms(FrameSlot),
    Record { slot: FrameSlot, image: ImageIndex, extent: RenderSize },
    Submit { slot: FrameSlot, signal: ImageIndex, generation: u32 },
    Present { image: ImageIndex, signal: ImageIndex, generation: u32 },
    WaitIdle,
    Recreate(RenderSize),
    DropFrame(FrameSlot),
    DropImageSignal { image: ImageIndex, generation: u32 },
    DropDevice { in_flight: usize },
}

#[derive(Clone, Default)]
pub struct EventLog(Rc<RefCell<Vec<DeviceEvent>>>);

impl EventLog {
    fn push(&self, event: DeviceEvent) {
        self.0.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<DeviceEvent> {
        self.0.borrow().clone()
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }

    pub fn count(&self, pred: impl Fn(&DeviceEvent) -> bool) -> usize {
        self.0.borrow().iter().filter(|e| pred(e)).count()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Fence {
    Signaled,
    Unsignaled,
    Pending,
}

pub struct MockFrame {
    slot: FrameSlot,
    log: EventLog,
    pub uniforms: Option<FrameUniforms>,
}

impl Drop for MockFrame {
    fn drop(&mut self) {
        self.log.push(DeviceEvent::DropFrame(self.slot));
    }
}

pub struct MockImageSignal {
    image: ImageIndex,
    generation: u32,
    log: EventLog,
}

impl Drop for MockImageSignal {
    fn drop(&mut self) {
        self.log.push(DeviceEvent::DropImageSignal {
            image: self.image,
            generation: self.generation,
        });
    }
}

pub struct MockDevice {
    log: EventLog,
    fences: Vec<Fence>,
    surface: SurfaceInfo,
    generation: u32,
    next_image: u32,
    image_count_after_recreate: Option<u32>,
    extent_after_recreate: Option<RenderSize>,
    acquire_script: VecDeque<Acquire>,
    present_script: VecDeque<Present>,
}

impl MockDevice {
    pub fn new(extent: RenderSize, image_count: u32) -> (Self, EventLog) {
        let log = EventLog::default();
        let device = Self {
            log: log.clone(),
            fences: Vec::new(),
            surface: SurfaceInfo {
                extent,
                image_count,
            },
            generation: 0,
            next_image: 0,
            image_count_after_recreate: None,
            extent_after_recreate: None,
            acquire_script: VecDeque::new(),
            present_script: VecDeque::new(),
        };
        (device, log)
    }

    /// Image count the next swapchain rebuild reports.
    pub fn set_image_count_after_recreate(&mut self, count: u32) {
        self.image_count_after_recreate = Some(count);
    }

    /// Extent the surface reports at the next rebuild, regardless of the
    /// requested size. An empty extent leaves the swapchain as it was.
    pub fn set_extent_after_recreate(&mut self, extent: RenderSize) {
        self.extent_after_recreate = Some(extent);
    }

    /// Results returned by upcoming `acquire` calls before falling back to
    /// handing out images round-robin.
    pub fn script_acquire(&mut self, results: impl IntoIterator<Item = Acquire>) {
        self.acquire_script.extend(results);
    }

    pub fn script_present(&mut self, results: impl IntoIterator<Item = Present>) {
        self.present_script.extend(results);
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn in_flight(&self) -> usize {
        self.fences.iter().filter(|f| **f == Fence::Pending).count()
    }

    fn fence(&self, slot: FrameSlot) -> Fence {
        self.fences[slot.index()]
    }

    fn set_fence(&mut self, slot: FrameSlot, fence: Fence) {
        self.fences[slot.index()] = fence;
    }

    fn ensure_writable(&self, slot: FrameSlot) -> Result<()> {
        if self.fence(slot) == Fence::Pending {
            bail!("{slot} touched while its previous submission is in flight");
        }
        Ok(())
    }

    fn ensure_current(&self, signal: &MockImageSignal) -> Result<()> {
        if signal.generation != self.generation {
            bail!(
                "{} belongs to swapchain generation {}, current is {}",
                signal.image,
                signal.generation,
                self.generation
            );
        }
        Ok(())
    }
}

impl Drop for MockDevice {
    fn drop(&mut self) {
        let in_flight = self.in_flight();
        self.log.push(DeviceEvent::DropDevice { in_flight });
    }
}

impl FrameDevice for MockDevice {
    type Frame = MockFrame;
    type ImageSignal = MockImageSignal;

    fn create_frame(&mut self, slot: FrameSlot) -> Result<MockFrame> {
        if self.fences.len() != slot.index() {
            bail!("{slot} created out of order");
        }
        self.fences.push(Fence::Signaled);
        self.log.push(DeviceEvent::CreateFrame(slot));
        Ok(MockFrame {
            slot,
            log: self.log.clone(),
            uniforms: None,
        })
    }

    fn create_image_signal(&mut self, image: ImageIndex) -> Result<MockImageSignal> {
        self.log.push(DeviceEvent::CreateImageSignal {
            image,
            generation: self.generation,
        });
        Ok(MockImageSignal {
            image,
            generation: self.generation,
            log: self.log.clone(),
        })
    }

    fn surface(&self) -> SurfaceInfo {
        self.surface
    }

    fn wait(&mut self, frame: &MockFrame) -> Result<()> {
        self.log.push(DeviceEvent::Wait(frame.slot));
        match self.fence(frame.slot) {
            Fence::Unsignaled => bail!("{} waits on a fence nothing will signal", frame.slot),
            // The simulated GPU finishes whatever was submitted as soon as someone waits.
            Fence::Pending | Fence::Signaled => self.set_fence(frame.slot, Fence::Signaled),
        }
        Ok(())
    }

    fn acquire(&mut self, frame: &MockFrame) -> Result<Acquire> {
        self.log.push(DeviceEvent::Acquire(frame.slot));
        if let Some(result) = self.acquire_script.pop_front() {
            return Ok(result);
        }
        let index = ImageIndex::new(self.next_image);
        self.next_image = (self.next_image + 1) % self.surface.image_count.max(1);
        Ok(Acquire::Image {
            index,
            suboptimal: false,
        })
    }

    fn reset(&mut self, frame: &MockFrame) -> Result<()> {
        self.log.push(DeviceEvent::Reset(frame.slot));
        if self.fence(frame.slot) != Fence::Signaled {
            bail!("{} reset before its fence was observed signaled", frame.slot);
        }
        self.set_fence(frame.slot, Fence::Unsignaled);
        Ok(())
    }

    fn write_uniforms(&mut self, frame: &mut MockFrame, uniforms: &FrameUniforms) -> Result<()> {
        self.log.push(DeviceEvent::WriteUniforms(frame.slot));
        self.ensure_writable(frame.slot)?;
        frame.uniforms = Some(*uniforms);
        Ok(())
    }

    fn record(&mut self, frame: &mut MockFrame, image: ImageIndex) -> Result<()> {
        self.log.push(DeviceEvent::Record {
            slot: frame.slot,
            image,
            extent: self.surface.extent,
        });
        self.ensure_writable(frame.slot)
    }

    fn submit(&mut self, frame: &MockFrame, signal: &MockImageSignal) -> Result<()> {
        self.log.push(DeviceEvent::Submit {
            slot: frame.slot,
            signal: signal.image,
            generation: signal.generation,
        });
        self.ensure_current(signal)?;
        if self.fence(frame.slot) != Fence::Unsignaled {
            bail!("{} submitted without resetting its fence", frame.slot);
        }
        self.set_fence(frame.slot, Fence::Pending);
        Ok(())
    }

    fn present(&mut self, image: ImageIndex, signal: &MockImageSignal) -> Result<Present> {
        self.log.push(DeviceEvent::Present {
            image,
            signal: signal.image,
            generation: signal.generation,
        });
        self.ensure_current(signal)?;
        Ok(self.present_script.pop_front().unwrap_or(Present::Presented))
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.log.push(DeviceEvent::WaitIdle);
        for fence in &mut self.fences {
            if *fence == Fence::Pending {
                *fence = Fence::Signaled;
            }
        }
        Ok(())
    }

    fn recreate_surface(&mut self, size: RenderSize) -> Result<SurfaceInfo> {
        self.log.push(DeviceEvent::Recreate(size));
        if self.in_flight() != 0 {
            bail!("swapchain rebuilt while {} frames are in flight", self.in_flight());
        }
        let extent = self.extent_after_recreate.take().unwrap_or(size);
        if extent.is_empty() {
            return Ok(SurfaceInfo {
                extent,
                image_count: self.surface.image_count,
            });
        }
        self.generation += 1;
        self.next_image = 0;
        self.surface = SurfaceInfo {
            extent,
            image_count: self
                .image_count_after_recreate
                .take()
                .unwrap_or(self.surface.image_count),
        };
        Ok(self.surface)
    }
}
