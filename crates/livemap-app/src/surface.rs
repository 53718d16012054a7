use image::imageops::{self, FilterType};
use image::RgbaImage;

use crate::media::DecodedFrame;
use crate::page::layout::LayoutBox;

/// CSS size and pixel density of the drawing surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceGeometry {
    pub css_width: f64,
    pub css_height: f64,
    pub device_pixel_ratio: f64,
}

impl SurfaceGeometry {
    /// Backing-store size: CSS size × device pixel ratio, rounded.
    pub fn backing_size(&self) -> (u32, u32) {
        (
            (self.css_width * self.device_pixel_ratio).round().max(0.0) as u32,
            (self.css_height * self.device_pixel_ratio).round().max(0.0) as u32,
        )
    }
}

/// CSS → device pixel transform. Only uniform scaling is needed.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Transform {
    scale: f64,
}

impl Transform {
    const IDENTITY: Self = Self { scale: 1.0 };

    fn apply(self, css_width: f64, css_height: f64) -> (u32, u32) {
        (
            (css_width * self.scale).round().max(0.0) as u32,
            (css_height * self.scale).round().max(0.0) as u32,
        )
    }
}

/// Treat missing or nonsensical ratios as 1.
fn sanitize_dpr(dpr: f64) -> f64 {
    if dpr.is_finite() && dpr > 0.0 { dpr } else { 1.0 }
}

/// The still/scrub canvas overlaying the map image.
pub struct RenderSurface {
    pixels: RgbaImage,
    geometry: Option<SurfaceGeometry>,
    transform: Transform,
    draw_count: u64,
}

impl RenderSurface {
    pub fn new() -> Self {
        Self {
            pixels: RgbaImage::new(0, 0),
            geometry: None,
            transform: Transform::IDENTITY,
            draw_count: 0,
        }
    }

    /// Size the surface to the reference element's layout box.
    ///
    /// Returns the CSS size to draw at, or `None` when the element has no
    /// extent yet.
    pub fn resize(&mut self, reference: &LayoutBox, device_pixel_ratio: f64) -> Option<(f64, f64)> {
        let css_width = f64::from(reference.width);
        let css_height = f64::from(reference.height);
        if !(css_width > 0.0 && css_height > 0.0) {
            return None;
        }

        let dpr = sanitize_dpr(device_pixel_ratio);
        let geometry = SurfaceGeometry {
            css_width,
            css_height,
            device_pixel_ratio: dpr,
        };
        let (width, height) = geometry.backing_size();
        if width == 0 || height == 0 {
            return None;
        }
        if self.pixels.dimensions() != (width, height) {
            self.pixels = RgbaImage::new(width, height);
        }
        self.transform = Transform { scale: dpr };
        self.geometry = Some(geometry);

        Some((css_width, css_height))
    }

    /// Clear the surface and draw `frame` stretched over it.
    /// Returns false if nothing was drawn.
    pub fn draw_frame(
        &mut self,
        frame: &DecodedFrame,
        reference: &LayoutBox,
        device_pixel_ratio: f64,
    ) -> bool {
        let Some((css_width, css_height)) = self.resize(reference, device_pixel_ratio) else {
            return false;
        };
        let Some(source) = frame.as_image() else {
            log::debug!("Skipping draw of malformed frame {frame:?}");
            return false;
        };
        let (width, height) = self.transform.apply(css_width, css_height);
        if frame.is_empty() || width == 0 || height == 0 {
            return false;
        }

        self.pixels.fill(0);
        let scaled = imageops::resize(&source, width, height, FilterType::Triangle);
        imageops::replace(&mut self.pixels, &scaled, 0, 0);
        self.draw_count += 1;
        true
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn geometry(&self) -> Option<SurfaceGeometry> {
        self.geometry
    }

    /// Number of completed draws since creation.
    pub fn draw_count(&self) -> u64 {
        self.draw_count
    }
}

impl Default for RenderSurface {
    fn default() -> Self {
        Self::new()
    }
}

/// The surface together with the element it overlays, as seen this refresh.
pub struct SurfaceTarget<'a> {
    pub surface: &'a mut RenderSurface,
    pub reference: LayoutBox,
    pub device_pixel_ratio: f64,
}

impl SurfaceTarget<'_> {
    pub fn draw(&mut self, frame: &DecodedFrame) -> bool {
        self.surface
            .draw_frame(frame, &self.reference, self.device_pixel_ratio)
    }
}
