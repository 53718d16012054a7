//! In-memory media built for tests.

use std::borrow::Cow;
use std::sync::Arc;

/// Solid color of each fixture frame, by index.
pub const PALETTE: [[u8; 3]; 12] = [
    [255, 0, 0],
    [0, 255, 0],
    [0, 0, 255],
    [255, 255, 0],
    [0, 255, 255],
    [255, 0, 255],
    [128, 0, 0],
    [0, 128, 0],
    [0, 0, 128],
    [128, 128, 0],
    [0, 128, 128],
    [128, 0, 128],
];

/// Animated GIF of `frames` solid-colored frames, `PALETTE[i]` for frame i.
pub fn animated_gif(frames: usize, width: u16, height: u16) -> Arc<[u8]> {
    assert!(frames <= PALETTE.len());
    let mut bytes = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut bytes, width, height, &[]).unwrap();
        encoder.set_repeat(gif::Repeat::Infinite).unwrap();
        for color in PALETTE.iter().take(frames) {
            let mut frame = gif::Frame::default();
            frame.width = width;
            frame.height = height;
            frame.palette = Some(vec![color[0], color[1], color[2], 0, 0, 0]);
            frame.buffer = Cow::Owned(vec![0u8; width as usize * height as usize]);
            encoder.write_frame(&frame).unwrap();
        }
    }
    Arc::from(bytes)
}
