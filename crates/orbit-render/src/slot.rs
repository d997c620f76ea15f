// SPDX-License-Identifier: CEPL-1.0
use std::fmt;
use std::ops::{Index, IndexMut};

use anyhow::Result;

use crate::MAX_FRAMES_IN_FLIGHT;

/// Position in the frames-in-flight ring. Only [`FrameCursor`] hands these out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FrameSlot(usize);

impl FrameSlot {
    pub fn index(self) -> usize {
        self.0
    }

    /// Every slot, in ring order.
    pub fn all() -> impl Iterator<Item = FrameSlot> {
        (0..MAX_FRAMES_IN_FLIGHT).map(FrameSlot)
    }
}

impl fmt::Display for FrameSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot#{}", self.0)
    }
}

/// Swapchain image index as returned by the presentation engine.
/// Unrelated to [`FrameSlot`]; it is neither sequential nor bounded by N.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageIndex(u32);

impl ImageIndex {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn get(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ImageIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "image#{}", self.0)
    }
}

/// Round-robin cursor over the frame ring.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCursor {
    current: usize,
}

impl FrameCursor {
    pub fn current(&self) -> FrameSlot {
        FrameSlot(self.current)
    }

    pub fn advance(&mut self) -> FrameSlot {
        self.current = (self.current + 1) % MAX_FRAMES_IN_FLIGHT;
        self.current()
    }
}

/// One bundle of per-frame resources per slot. Indexable only by [`FrameSlot`].
pub struct FrameRing<F> {
    frames: Vec<F>,
}

impl<F> FrameRing<F> {
    pub fn create(make: impl FnMut(FrameSlot) -> Result<F>) -> Result<Self> {
        let frames = FrameSlot::all().map(make).collect::<Result<Vec<_>>>()?;
        Ok(Self { frames })
    }

    pub fn iter(&self) -> impl Iterator<Item = (FrameSlot, &F)> {
        self.frames.iter().enumerate().map(|(i, f)| (FrameSlot(i), f))
    }
}

impl<F> Index<FrameSlot> for FrameRing<F> {
    type Output = F;

    fn index(&self, slot: FrameSlot) -> &F {
        &self.frames[slot.0]
    }
}

impl<F> IndexMut<FrameSlot> for FrameRing<F> {
    fn index_mut(&mut self, slot: FrameSlot) -> &mut F {
        &mut self.frames[slot.0]
    }
}

/// One render-complete signal per swapchain image. Indexable only by [`ImageIndex`].
pub struct ImageSignals<S> {
    signals: Vec<S>,
}

impl<S> ImageSignals<S> {
    pub fn empty() -> Self {
        Self {
            signals: Vec::new(),
        }
    }

    pub fn create(count: u32, mut make: impl FnMut(ImageIndex) -> Result<S>) -> Result<Self> {
        let signals = (0..count)
            .map(|i| make(ImageIndex(i)))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { signals })
    }

    pub fn get(&self, image: ImageIndex) -> Option<&S> {
        self.signals.get(image.as_usize())
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Drops every signal. Callers idle the device first.
    pub fn clear(&mut self) {
        self.signals.clear();
    }
}

impl<S> Index<ImageIndex> for ImageSignals<S> {
    type Output = S;

    fn index(&self, image: ImageIndex) -> &S {
        &self.signals[image.as_usize()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cursor_cycles_round_robin() {
        let mut cursor = FrameCursor::default();
        let mut seen = vec![cursor.current().index()];
        for _ in 0..7 {
            seen.push(cursor.advance().index());
        }
        assert_eq!(seen, [0, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn ring_has_one_entry_per_slot() {
        let ring = FrameRing::create(|slot| Ok(slot.index() * 10)).unwrap();
        let values: Vec<_> = ring.iter().map(|(_, v)| *v).collect();
        assert_eq!(values.len(), MAX_FRAMES_IN_FLIGHT);
        assert_eq!(ring[FrameCursor::default().current()], 0);
    }

    #[test]
    fn ring_creation_stops_at_first_error() {
        let mut made = 0;
        let ring = FrameRing::<()>::create(|slot| {
            made += 1;
            if slot.index() == 0 {
                anyhow::bail!("no memory")
            }
            Ok(())
        });
        assert!(ring.is_err());
        assert_eq!(made, 1);
    }

    #[test]
    fn image_signals_follow_image_count() {
        let signals = ImageSignals::create(3, |i| Ok(i.get())).unwrap();
        assert_eq!(signals.len(), 3);
        assert_eq!(signals[ImageIndex::new(2)], 2);
        assert!(signals.get(ImageIndex::new(3)).is_none());
    }
}
