use std::io::Cursor;
use std::sync::Arc;

use gif::DisposalMethod;
use image_webp::WebPDecoder;

use super::types::DecodedFrame;
use crate::error::DecodeError;

/// Floor for frame delays, so zero-delay frames don't spin playback.
const MIN_FRAME_DELAY_MS: u32 = 20;

/// Container format of an animated source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackFormat {
    WebP,
    Gif,
}

impl TrackFormat {
    /// Identify the format from magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
            Some(TrackFormat::WebP)
        } else if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
            Some(TrackFormat::Gif)
        } else {
            None
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            TrackFormat::WebP => "image/webp",
            TrackFormat::Gif => "image/gif",
        }
    }
}

/// The selected track of a source: what a decoder can hand out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub format: TrackFormat,
    pub width: u32,
    pub height: u32,
    pub frame_count: u32,
}

/// Random-access frame decoding over one track.
///
/// Implementations decode sequentially under the hood; requesting an index
/// behind the current read position restarts the track.
pub trait FrameDecoder: Send {
    fn track(&self) -> &TrackInfo;

    /// Decode the complete (composited) frame at `index`.
    fn decode(&mut self, index: u32) -> Result<DecodedFrame, DecodeError>;
}

/// Open the selected track of an animated WebP or GIF.
pub fn open_track(source: Arc<[u8]>) -> Result<Box<dyn FrameDecoder>, DecodeError> {
    match TrackFormat::sniff(&source) {
        Some(TrackFormat::WebP) => Ok(Box::new(WebPTrack::open(source)?)),
        Some(TrackFormat::Gif) => Ok(Box::new(GifTrack::open(source)?)),
        None => Err(DecodeError::UnknownFormat),
    }
}

/// Decode every frame of a track in order.
pub fn decode_all(decoder: &mut dyn FrameDecoder) -> Result<Vec<DecodedFrame>, DecodeError> {
    let count = decoder.track().frame_count;
    (0..count).map(|i| decoder.decode(i)).collect()
}

fn check_index(info: &TrackInfo, index: u32) -> Result<(), DecodeError> {
    if index >= info.frame_count {
        return Err(DecodeError::IndexOutOfRange {
            index,
            count: info.frame_count,
        });
    }
    Ok(())
}

// ---- WebP ----

struct WebPTrack {
    source: Arc<[u8]>,
    decoder: WebPDecoder<Cursor<Arc<[u8]>>>,
    info: TrackInfo,
    next_index: u32,
    buf: Vec<u8>,
    /// Delay of the frame held in `buf`.
    last_delay: u32,
}

impl WebPTrack {
    fn open(source: Arc<[u8]>) -> Result<Self, DecodeError> {
        let decoder = WebPDecoder::new(Cursor::new(source.clone()))?;
        let (width, height) = decoder.dimensions();
        let frame_count = if decoder.is_animated() {
            decoder.num_frames()
        } else {
            1
        };
        let size = decoder
            .output_buffer_size()
            .ok_or_else(|| DecodeError::Malformed("image too large".into()))?;

        Ok(Self {
            source,
            decoder,
            info: TrackInfo {
                format: TrackFormat::WebP,
                width,
                height,
                frame_count,
            },
            next_index: 0,
            buf: vec![0u8; size],
            last_delay: 0,
        })
    }

    fn restart(&mut self) -> Result<(), DecodeError> {
        self.decoder = WebPDecoder::new(Cursor::new(self.source.clone()))?;
        self.next_index = 0;
        Ok(())
    }

    fn to_frame(&self, delay_ms: u32) -> DecodedFrame {
        let data = if self.decoder.has_alpha() {
            self.buf.clone()
        } else {
            let mut rgba = Vec::with_capacity(self.buf.len() / 3 * 4);
            for px in self.buf.chunks_exact(3) {
                rgba.extend_from_slice(&[px[0], px[1], px[2], 255]);
            }
            rgba
        };
        DecodedFrame {
            data,
            width: self.info.width,
            height: self.info.height,
            delay_ms: delay_ms.max(MIN_FRAME_DELAY_MS),
        }
    }
}

impl FrameDecoder for WebPTrack {
    fn track(&self) -> &TrackInfo {
        &self.info
    }

    fn decode(&mut self, index: u32) -> Result<DecodedFrame, DecodeError> {
        check_index(&self.info, index)?;

        // `buf` already holds this frame
        if index + 1 == self.next_index {
            return Ok(self.to_frame(self.last_delay));
        }

        if !self.decoder.is_animated() {
            if self.next_index > 0 {
                self.restart()?;
            }
            self.decoder.read_image(&mut self.buf)?;
            self.next_index = 1;
            return Ok(self.to_frame(0));
        }

        if index < self.next_index {
            self.restart()?;
        }

        let mut delay = 0;
        while self.next_index <= index {
            delay = self.decoder.read_frame(&mut self.buf)?;
            self.next_index += 1;
        }
        self.last_delay = delay;
        Ok(self.to_frame(delay))
    }
}

// ---- GIF ----

type GifReader = gif::Decoder<Cursor<Arc<[u8]>>>;

/// Area a frame occupied, for disposal.
#[derive(Clone, Copy)]
struct FrameRect {
    left: u32,
    top: u32,
    width: u32,
    height: u32,
}

struct GifTrack {
    source: Arc<[u8]>,
    reader: GifReader,
    info: TrackInfo,
    next_index: u32,
    canvas: Vec<u8>,
    /// Canvas saved for `DisposalMethod::Previous`.
    saved: Option<Vec<u8>>,
    pending_dispose: Option<(DisposalMethod, FrameRect)>,
    last_delay: u32,
}

impl GifTrack {
    fn reader(source: &Arc<[u8]>) -> Result<GifReader, DecodeError> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        Ok(options.read_info(Cursor::new(source.clone()))?)
    }

    fn open(source: Arc<[u8]>) -> Result<Self, DecodeError> {
        // GIF has no frame table; count by walking the stream once.
        let mut counter = Self::reader(&source)?;
        let mut frame_count = 0u32;
        while counter.read_next_frame()?.is_some() {
            frame_count += 1;
        }
        if frame_count == 0 {
            return Err(DecodeError::Malformed("GIF has no frames".into()));
        }

        let reader = Self::reader(&source)?;
        let width = reader.width() as u32;
        let height = reader.height() as u32;

        Ok(Self {
            source,
            reader,
            info: TrackInfo {
                format: TrackFormat::Gif,
                width,
                height,
                frame_count,
            },
            next_index: 0,
            canvas: vec![0u8; (width * height * 4) as usize],
            saved: None,
            pending_dispose: None,
            last_delay: 0,
        })
    }

    fn restart(&mut self) -> Result<(), DecodeError> {
        self.reader = Self::reader(&self.source)?;
        self.canvas.fill(0);
        self.saved = None;
        self.pending_dispose = None;
        self.next_index = 0;
        Ok(())
    }

    fn clear_rect(&mut self, rect: FrameRect) {
        let width = self.info.width;
        let height = self.info.height;
        for y in rect.top..(rect.top + rect.height).min(height) {
            for x in rect.left..(rect.left + rect.width).min(width) {
                let idx = ((y * width + x) * 4) as usize;
                self.canvas[idx..idx + 4].fill(0);
            }
        }
    }

    /// Read the next frame onto the canvas. Returns its delay in ms.
    fn advance(&mut self) -> Result<u32, DecodeError> {
        match self.pending_dispose.take() {
            Some((DisposalMethod::Background, rect)) => self.clear_rect(rect),
            Some((DisposalMethod::Previous, _)) => {
                if let Some(saved) = self.saved.take() {
                    self.canvas = saved;
                }
            }
            _ => {}
        }

        let width = self.info.width;
        let height = self.info.height;
        let frame = self
            .reader
            .read_next_frame()?
            .ok_or_else(|| DecodeError::Malformed("GIF ended early".into()))?;

        let rect = FrameRect {
            left: frame.left as u32,
            top: frame.top as u32,
            width: frame.width as u32,
            height: frame.height as u32,
        };
        let dispose = frame.dispose;
        let delay = frame.delay as u32 * 10; // centiseconds

        if dispose == DisposalMethod::Previous {
            self.saved = Some(self.canvas.clone());
        }

        // Composite frame onto canvas at its offset
        for y in 0..rect.height {
            for x in 0..rect.width {
                let src_idx = ((y * rect.width + x) * 4) as usize;
                let dst_x = rect.left + x;
                let dst_y = rect.top + y;
                if dst_x >= width || dst_y >= height {
                    continue;
                }
                let Some(src) = frame.buffer.get(src_idx..src_idx + 4) else {
                    continue;
                };
                // Transparent pixels leave the canvas untouched
                if src[3] > 0 {
                    let dst_idx = ((dst_y * width + dst_x) * 4) as usize;
                    self.canvas[dst_idx..dst_idx + 4].copy_from_slice(src);
                }
            }
        }

        self.pending_dispose = Some((dispose, rect));
        self.next_index += 1;
        Ok(delay)
    }
}

impl FrameDecoder for GifTrack {
    fn track(&self) -> &TrackInfo {
        &self.info
    }

    fn decode(&mut self, index: u32) -> Result<DecodedFrame, DecodeError> {
        check_index(&self.info, index)?;
        // The canvas still holds frame `next_index - 1`
        if index + 1 < self.next_index {
            self.restart()?;
        }

        while self.next_index <= index {
            self.last_delay = self.advance()?;
        }
        let delay = self.last_delay;

        Ok(DecodedFrame {
            data: self.canvas.clone(),
            width: self.info.width,
            height: self.info.height,
            delay_ms: delay.max(MIN_FRAME_DELAY_MS),
        })
    }
}
