use serde::{Deserialize, Serialize};

use crate::scrub::progress::ScrollGeometry;

/// Aspect ratio assumed until the live image reports its natural size.
const DEFAULT_ASPECT: f32 = 16.0 / 9.0;

/// Axis-aligned box in CSS pixels, relative to the viewport.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LayoutBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl LayoutBox {
    /// Translate into device pixels.
    pub fn to_device(&self, dpr: f64) -> (i64, i64, u32, u32) {
        let s = dpr as f32;
        (
            (self.x * s).round() as i64,
            (self.y * s).round() as i64,
            (self.width * s).round().max(0.0) as u32,
            (self.height * s).round().max(0.0) as u32,
        )
    }
}

/// Placement of the map region within the page, in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageConfig {
    /// Document offset of the region's top edge.
    pub region_top: f32,
    pub region_padding: f32,
    pub region_max_width: f32,
    pub side_margin: f32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            region_top: 900.0,
            region_padding: 24.0,
            region_max_width: 960.0,
            side_margin: 24.0,
        }
    }
}

/// Presentation flags on the map region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RegionFlags {
    /// The still surface is shown and the live image hidden.
    pub still: bool,
    /// Set once the scrubber has drawn its first frame.
    pub scrub_ready: bool,
}

impl RegionFlags {
    /// Whether the surface, rather than the live image, is visible.
    pub fn shows_surface(&self) -> bool {
        self.still || self.scrub_ready
    }
}

/// Host page geometry: viewport, scroll position, and the map region.
#[derive(Debug, Clone)]
pub struct PageLayout {
    config: PageConfig,
    viewport_width: f32,
    viewport_height: f32,
    device_pixel_ratio: f64,
    scroll_y: f32,
    image_aspect: f32,
    pub flags: RegionFlags,
}

impl PageLayout {
    pub fn new(config: PageConfig, viewport_width: f32, viewport_height: f32, dpr: f64) -> Self {
        Self {
            config,
            viewport_width,
            viewport_height,
            device_pixel_ratio: dpr,
            scroll_y: 0.0,
            image_aspect: DEFAULT_ASPECT,
            flags: RegionFlags::default(),
        }
    }

    pub fn viewport_width(&self) -> f32 {
        self.viewport_width
    }

    pub fn viewport_height(&self) -> f32 {
        self.viewport_height
    }

    pub fn device_pixel_ratio(&self) -> f64 {
        self.device_pixel_ratio
    }

    pub fn scroll_y(&self) -> f32 {
        self.scroll_y
    }

    fn image_width(&self) -> f32 {
        let available = (self.viewport_width - 2.0 * self.config.side_margin).max(0.0);
        let region_width = available.min(self.config.region_max_width);
        (region_width - 2.0 * self.config.region_padding).max(0.0)
    }

    fn image_height(&self) -> f32 {
        self.image_width() / self.image_aspect
    }

    fn region_height(&self) -> f32 {
        let image_height = self.image_height();
        if image_height > 0.0 {
            image_height + 2.0 * self.config.region_padding
        } else {
            0.0
        }
    }

    /// Total document height: room to scroll the region fully past the top.
    pub fn page_height(&self) -> f32 {
        self.config.region_top + self.region_height() + self.viewport_height
    }

    pub fn max_scroll(&self) -> f32 {
        (self.page_height() - self.viewport_height).max(0.0)
    }

    /// Bounding box of the map region relative to the viewport.
    pub fn region_rect(&self) -> LayoutBox {
        let image_width = self.image_width();
        let width = if image_width > 0.0 {
            image_width + 2.0 * self.config.region_padding
        } else {
            0.0
        };
        LayoutBox {
            x: (self.viewport_width - width) / 2.0,
            y: self.config.region_top - self.scroll_y,
            width,
            height: self.region_height(),
        }
    }

    /// Bounding box of the live image (the surface's reference element).
    pub fn image_rect(&self) -> LayoutBox {
        let region = self.region_rect();
        if region.height <= 0.0 {
            return LayoutBox {
                x: region.x,
                y: region.y,
                width: 0.0,
                height: 0.0,
            };
        }
        LayoutBox {
            x: region.x + self.config.region_padding,
            y: region.y + self.config.region_padding,
            width: self.image_width(),
            height: self.image_height(),
        }
    }

    /// Geometry the progress mapper works from.
    pub fn scroll_geometry(&self) -> ScrollGeometry {
        let region = self.region_rect();
        ScrollGeometry {
            region_top: region.y,
            region_height: region.height,
            viewport_height: self.viewport_height,
        }
    }

    /// Scroll by `dy` CSS pixels. Returns whether the offset changed.
    pub fn scroll_by(&mut self, dy: f32) -> bool {
        self.scroll_to(self.scroll_y + dy)
    }

    pub fn scroll_to(&mut self, y: f32) -> bool {
        let clamped = y.clamp(0.0, self.max_scroll());
        if (clamped - self.scroll_y).abs() < f32::EPSILON {
            return false;
        }
        self.scroll_y = clamped;
        true
    }

    /// Apply a new viewport size. Keeps the scroll offset in range.
    pub fn set_viewport(&mut self, width: f32, height: f32, dpr: f64) {
        self.viewport_width = width;
        self.viewport_height = height;
        self.device_pixel_ratio = dpr;
        self.scroll_y = self.scroll_y.clamp(0.0, self.max_scroll());
    }

    /// Adopt the live image's natural aspect ratio once known.
    pub fn set_image_size(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.image_aspect = width as f32 / height as f32;
            self.scroll_y = self.scroll_y.clamp(0.0, self.max_scroll());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> PageLayout {
        let config = PageConfig {
            region_top: 1000.0,
            region_padding: 20.0,
            region_max_width: 840.0,
            side_margin: 10.0,
        };
        let mut page = PageLayout::new(config, 1280.0, 800.0, 1.0);
        page.set_image_size(800, 400);
        page
    }

    #[test]
    fn region_and_image_geometry() {
        let page = page();
        let region = page.region_rect();
        assert_eq!(region.width, 840.0);
        assert_eq!(region.height, 440.0);
        assert_eq!(region.x, 220.0);
        assert_eq!(region.y, 1000.0);

        let image = page.image_rect();
        assert_eq!(image.width, 800.0);
        assert_eq!(image.height, 400.0);
        assert_eq!((image.x, image.y), (240.0, 1020.0));
    }

    #[test]
    fn scrolling_moves_region_up() {
        let mut page = page();
        assert!(page.scroll_by(300.0));
        assert_eq!(page.region_rect().y, 700.0);
        assert_eq!(page.scroll_geometry().region_top, 700.0);
    }

    #[test]
    fn scroll_is_clamped() {
        let mut page = page();
        assert!(!page.scroll_by(-50.0));
        assert_eq!(page.scroll_y(), 0.0);

        page.scroll_to(1.0e6);
        // page height = 1000 + 440 + 800
        assert_eq!(page.scroll_y(), 1440.0);
        // Region has scrolled fully past the top
        assert_eq!(page.region_rect().y, -440.0);
    }

    #[test]
    fn narrow_viewport_shrinks_image() {
        let mut page = page();
        page.set_viewport(420.0, 800.0, 2.0);
        let image = page.image_rect();
        assert_eq!(image.width, 360.0);
        assert_eq!(image.height, 180.0);
        assert_eq!(image.to_device(2.0).2, 720);
    }

    #[test]
    fn tiny_viewport_has_zero_extent() {
        let mut page = page();
        page.set_viewport(30.0, 800.0, 1.0);
        assert_eq!(page.image_rect().width, 0.0);
        assert_eq!(page.image_rect().height, 0.0);
    }

    #[test]
    fn surface_visibility_follows_flags() {
        let mut flags = RegionFlags::default();
        assert!(!flags.shows_surface());
        flags.still = true;
        assert!(flags.shows_surface());
        flags = RegionFlags {
            still: false,
            scrub_ready: true,
        };
        assert!(flags.shows_surface());
    }
}
