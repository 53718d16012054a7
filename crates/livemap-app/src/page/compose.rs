use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

use super::layout::{LayoutBox, PageLayout};
use super::live::LiveImage;
use crate::surface::RenderSurface;

const BACKGROUND: Rgba<u8> = Rgba([244, 241, 234, 255]);
const REGION: Rgba<u8> = Rgba([226, 221, 210, 255]);
/// Shown where the image would be while it is still loading.
const PLACEHOLDER: Rgba<u8> = Rgba([205, 199, 186, 255]);

/// Scaled copy of a live frame, reused until the frame or size changes.
struct ScaledFrame {
    frame_index: usize,
    size: (u32, u32),
    pixels: RgbaImage,
}

/// Paints the visible part of the page into a device-pixel framebuffer.
pub struct PageCompositor {
    frame: RgbaImage,
    live_cache: Option<ScaledFrame>,
}

impl PageCompositor {
    pub fn new() -> Self {
        Self {
            frame: RgbaImage::new(0, 0),
            live_cache: None,
        }
    }

    pub fn compose(&mut self, layout: &PageLayout, live: &LiveImage, surface: &RenderSurface) -> &RgbaImage {
        let dpr = layout.device_pixel_ratio();
        let width = (f64::from(layout.viewport_width()) * dpr).round().max(1.0) as u32;
        let height = (f64::from(layout.viewport_height()) * dpr).round().max(1.0) as u32;
        if self.frame.dimensions() != (width, height) {
            self.frame = RgbaImage::new(width, height);
        }

        let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut *self.frame);
        pixels.fill(BACKGROUND.0);
        fill_rect(&mut self.frame, layout.region_rect(), dpr, REGION);

        let image_rect = layout.image_rect();
        let (x, y, w, h) = image_rect.to_device(dpr);
        if w == 0 || h == 0 {
            return &self.frame;
        }

        if layout.flags.shows_surface() && !surface.pixels().is_empty() {
            imageops::overlay(&mut self.frame, surface.pixels(), x, y);
        } else if let Some(current) = live.current_frame() {
            let stale = self
                .live_cache
                .as_ref()
                .is_none_or(|c| c.frame_index != live.frame_index() || c.size != (w, h));
            if stale {
                if let Some(view) = current.as_image() {
                    self.live_cache = Some(ScaledFrame {
                        frame_index: live.frame_index(),
                        size: (w, h),
                        pixels: imageops::resize(&view, w, h, FilterType::Triangle),
                    });
                }
            }
            if let Some(cache) = &self.live_cache {
                imageops::overlay(&mut self.frame, &cache.pixels, x, y);
            }
        } else {
            fill_rect(&mut self.frame, image_rect, dpr, PLACEHOLDER);
        }

        &self.frame
    }
}

impl Default for PageCompositor {
    fn default() -> Self {
        Self::new()
    }
}

/// Fill a CSS-pixel box, clipped to the framebuffer.
fn fill_rect(frame: &mut RgbaImage, rect: LayoutBox, dpr: f64, color: Rgba<u8>) {
    let (x, y, w, h) = rect.to_device(dpr);
    let (fw, fh) = frame.dimensions();
    let x0 = x.clamp(0, i64::from(fw)) as u32;
    let y0 = y.clamp(0, i64::from(fh)) as u32;
    let x1 = (x + i64::from(w)).clamp(0, i64::from(fw)) as u32;
    let y1 = (y + i64::from(h)).clamp(0, i64::from(fh)) as u32;
    if x0 >= x1 {
        return;
    }
    let pixels: &mut [[u8; 4]] = bytemuck::cast_slice_mut(&mut **frame);
    for py in y0..y1 {
        let row = (py * fw) as usize;
        pixels[row + x0 as usize..row + x1 as usize].fill(color.0);
    }
}
