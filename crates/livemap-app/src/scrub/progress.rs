/// Share of the viewport height at which scrubbing begins.
pub const DEFAULT_START_FRACTION: f32 = 0.9;

/// Viewport-relative geometry of the scrubbed region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollGeometry {
    /// Top edge of the region relative to the viewport top.
    pub region_top: f32,
    pub region_height: f32,
    pub viewport_height: f32,
}

/// Map region position to scrub progress in [0, 1].
///
/// Progress starts when the region's top crosses `viewport_height * start_fraction`
/// and completes once the region has scrolled fully past the top edge.
pub fn scroll_progress(geometry: &ScrollGeometry, start_fraction: f32) -> f32 {
    let start = geometry.viewport_height * start_fraction;
    let end = -geometry.region_height;
    let span = start - end;
    if span.is_nan() || span <= 0.0 {
        return 0.0;
    }
    let raw = (start - geometry.region_top) / span;
    raw.clamp(0.0, 1.0)
}

/// Frame index for a progress value: `round(progress * (frame_count - 1))`.
pub fn target_frame_index(progress: f32, frame_count: u32) -> Option<u32> {
    if frame_count == 0 {
        return None;
    }
    let last = frame_count - 1;
    let index = (progress.clamp(0.0, 1.0) * last as f32).round() as u32;
    Some(index.min(last))
}
