use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{ImageBuffer, Rgba};

/// A decoded frame, composited to full canvas size.
#[derive(Clone)]
pub struct DecodedFrame {
    pub data: Vec<u8>, // RGBA8
    pub width: u32,
    pub height: u32,
    /// Display duration of this frame in milliseconds.
    pub delay_ms: u32,
}

impl DecodedFrame {
    /// Borrow the pixel data as an `image` buffer view.
    pub fn as_image(&self) -> Option<ImageBuffer<Rgba<u8>, &[u8]>> {
        ImageBuffer::from_raw(self.width, self.height, self.data.as_slice())
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Debug for DecodedFrame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedFrame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("delay_ms", &self.delay_ms)
            .finish_non_exhaustive()
    }
}

/// Counts bitmaps that a decode session has handed out and not yet released.
#[derive(Clone, Default)]
pub struct BitmapLedger {
    live: Arc<AtomicUsize>,
}

impl BitmapLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a freshly decoded frame so its release is accounted for.
    pub fn track(&self, frame: DecodedFrame) -> FrameBitmap {
        self.live.fetch_add(1, Ordering::AcqRel);
        FrameBitmap {
            frame,
            ledger: self.live.clone(),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }
}

/// Decoder-owned bitmap. Must be released after drawing or discarding;
/// dropping it releases it as well.
pub struct FrameBitmap {
    frame: DecodedFrame,
    ledger: Arc<AtomicUsize>,
}

impl FrameBitmap {
    pub fn frame(&self) -> &DecodedFrame {
        &self.frame
    }

    /// Release the bitmap's pixel memory.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for FrameBitmap {
    fn drop(&mut self) {
        self.ledger.fetch_sub(1, Ordering::AcqRel);
    }
}

impl std::fmt::Debug for FrameBitmap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("FrameBitmap").field(&self.frame).finish()
    }
}
