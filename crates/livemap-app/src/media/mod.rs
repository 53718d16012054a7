pub mod decoder;
pub mod fetch;
#[cfg(test)]
pub mod fixtures;
pub mod types;

pub use decoder::{FrameDecoder, TrackFormat};
pub use types::{BitmapLedger, DecodedFrame, FrameBitmap};
