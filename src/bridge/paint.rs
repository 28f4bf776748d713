//! Dirty-rectangle updates.
//!
//! A [`PaintUpdate`] carries new pixels for one surface. Applying it is the only way pixel
//! content changes outside of a resize: the live surface is mutated in place, there is no
//! frame buffering.

use crate::config::ScrollMode;
use crate::errors::BridgeError;
use crate::events::WidgetId;
use crate::render::{ErasedSurface, PixelRect, RenderBackend, SurfaceSize};

/// Surface a paint update is addressed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PaintTarget {
    Primary,
    Widget(WidgetId),
}

/// Scroll hint sent along with a paint: the content of `rect` moved by `(dx, dy)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollDelta {
    pub dx: i32,
    pub dy: i32,
    pub rect: PixelRect,
}

/// New pixels for `rect` of the target surface.
#[derive(Clone)]
pub struct PaintUpdate {
    pub target: PaintTarget,
    /// Row-major, 32 bits per pixel, `stride` bytes per row. The first byte is the
    /// top-left pixel of `rect`.
    pub pixels: Vec<u8>,
    pub stride: u32,
    pub rect: PixelRect,
    pub scroll: Option<ScrollDelta>,
}

impl PaintUpdate {
    /// A tightly packed update without scroll hint.
    pub fn new(target: PaintTarget, rect: PixelRect, pixels: Vec<u8>) -> Self {
        Self {
            target,
            pixels,
            stride: rect.width * 4,
            rect,
            scroll: None,
        }
    }

    /// A tightly packed update filling `rect` with one pixel value.
    pub fn solid(target: PaintTarget, rect: PixelRect, pixel: [u8; 4]) -> Self {
        let count = rect.width as usize * rect.height as usize;
        let pixels = pixel.iter().copied().cycle().take(count * 4).collect();
        Self::new(target, rect, pixels)
    }

    pub fn with_stride(mut self, stride: u32) -> Self {
        self.stride = stride;
        self
    }

    pub fn with_scroll(mut self, dx: i32, dy: i32, rect: PixelRect) -> Self {
        self.scroll = Some(ScrollDelta { dx, dy, rect });
        self
    }

    /// Returns true when `pixels` holds enough rows of `stride` bytes to cover `rect`.
    pub fn is_well_formed(&self) -> bool {
        if self.rect.is_empty() {
            return true;
        }
        let row_len = self.rect.width as usize * 4;
        let needed = (self.rect.height as usize - 1) * self.stride as usize + row_len;
        self.stride as usize >= row_len && self.pixels.len() >= needed
    }
}

impl std::fmt::Debug for PaintUpdate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaintUpdate")
            .field("target", &self.target)
            .field("rect", &self.rect)
            .field("stride", &self.stride)
            .field("len", &self.pixels.len())
            .field("scroll", &self.scroll)
            .finish()
    }
}

/// What happened to a paint update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PaintOutcome {
    Applied,
    /// No surface exists for the target (widget gone or not yet created, no primary).
    DroppedUnknownTarget,
    /// The rectangle reaches past the surface. The surface is stale, a resize is on its way.
    DroppedOutOfBounds,
    /// The pixel buffer is too short for the rectangle and stride.
    DroppedMalformed,
}

impl PaintOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PaintOutcome::Applied)
    }
}

/// Writes `update` into `surface`, whose visible part is `logical`.
///
/// The caller holds the sync lock. The surface is unbound while it is written and bound
/// again afterwards, ready for the next draw.
pub(crate) fn apply(
    backend: &mut dyn RenderBackend,
    surface: &mut dyn ErasedSurface,
    logical: SurfaceSize,
    update: &PaintUpdate,
    scroll_mode: ScrollMode,
) -> Result<PaintOutcome, BridgeError> {
    if !update.rect.fits_within(logical.width, logical.height) {
        log::debug!(
            "dropping paint {:?} for {:?}: outside of {}x{}",
            update.rect,
            update.target,
            logical.width,
            logical.height
        );
        return Ok(PaintOutcome::DroppedOutOfBounds);
    }
    if !update.is_well_formed() {
        log::warn!("dropping malformed paint {:?}", update);
        return Ok(PaintOutcome::DroppedMalformed);
    }

    backend.bind(None);

    if let (ScrollMode::Shift, Some(scroll)) = (scroll_mode, update.scroll) {
        if scroll.dx != 0 || scroll.dy != 0 {
            let visible = PixelRect::from_size(logical.width, logical.height);
            if let Some(region) = scroll.rect.intersect(&visible) {
                backend.shift_region(surface, region, scroll.dx, scroll.dy)?;
            }
        }
    }

    backend.upload(surface, update.rect, &update.pixels, update.stride)?;
    backend.bind(Some(&*surface));

    log::trace!("painted {:?} into {:?}", update.rect, update.target);
    Ok(PaintOutcome::Applied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::cpu::CpuBackend;
    use crate::render::PixelFormat;

    const RED: [u8; 4] = [0, 0, 255, 255];
    const CLEAR: [u8; 4] = [0, 0, 0, 0];

    fn setup(width: u32, height: u32) -> (CpuBackend, Box<dyn ErasedSurface>) {
        let mut backend = CpuBackend::new();
        let surface = backend
            .create_surface(SurfaceSize::new(width, height), PixelFormat::PreMulArgb32)
            .unwrap();
        (backend, surface)
    }

    #[test]
    fn applied_paint_matches_source() {
        let (mut backend, mut surface) = setup(8, 8);
        let stats = backend.stats();
        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(2, 3, 4, 2), RED);

        let outcome =
            apply(&mut backend, surface.as_mut(), SurfaceSize::new(8, 8), &update, ScrollMode::Ignore).unwrap();
        assert_eq!(outcome, PaintOutcome::Applied);
        assert_eq!(stats.bound(), Some(surface.id()));

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        for y in 0..8 {
            for x in 0..8 {
                let inside = (2..6).contains(&x) && (3..5).contains(&y);
                assert_eq!(img.pixel(x, y), Some(if inside { RED } else { CLEAR }), "at {x},{y}");
            }
        }
    }

    #[test]
    fn out_of_bounds_is_dropped_not_clipped() {
        let (mut backend, mut surface) = setup(4, 4);
        let stats = backend.stats();
        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(2, 0, 3, 1), RED);

        let outcome =
            apply(&mut backend, surface.as_mut(), SurfaceSize::new(4, 4), &update, ScrollMode::Ignore).unwrap();
        assert_eq!(outcome, PaintOutcome::DroppedOutOfBounds);
        assert_eq!(stats.uploads(), 0);
        assert_eq!(backend.read_pixels(surface.as_ref()).unwrap().pixel(2, 0), Some(CLEAR));
    }

    #[test]
    fn bounds_use_the_logical_size() {
        // Allocated at a power of two, but only 3x3 is visible.
        let (mut backend, mut surface) = setup(4, 4);
        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(3, 3, 1, 1), RED);
        let outcome =
            apply(&mut backend, surface.as_mut(), SurfaceSize::new(3, 3), &update, ScrollMode::Ignore).unwrap();
        assert_eq!(outcome, PaintOutcome::DroppedOutOfBounds);
    }

    #[test]
    fn short_buffer_is_dropped() {
        let (mut backend, mut surface) = setup(4, 4);
        let mut update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::from_size(2, 2), RED);
        update.pixels.truncate(12);

        let outcome =
            apply(&mut backend, surface.as_mut(), SurfaceSize::new(4, 4), &update, ScrollMode::Ignore).unwrap();
        assert_eq!(outcome, PaintOutcome::DroppedMalformed);
    }

    #[test]
    fn scroll_is_ignored_by_default() {
        let (mut backend, mut surface) = setup(1, 3);
        let rows: Vec<u8> = (1..=3u8).flat_map(|i| [i, i, i, 255]).collect();
        let full = PaintUpdate::new(PaintTarget::Primary, PixelRect::from_size(1, 3), rows);
        apply(&mut backend, surface.as_mut(), SurfaceSize::new(1, 3), &full, ScrollMode::Ignore).unwrap();

        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(0, 2, 1, 1), RED)
            .with_scroll(0, -1, PixelRect::from_size(1, 3));
        apply(&mut backend, surface.as_mut(), SurfaceSize::new(1, 3), &update, ScrollMode::Ignore).unwrap();

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        assert_eq!(img.pixel(0, 0), Some([1, 1, 1, 255]));
        assert_eq!(img.pixel(0, 1), Some([2, 2, 2, 255]));
        assert_eq!(img.pixel(0, 2), Some(RED));
    }

    #[test]
    fn scroll_shift_moves_content_before_upload() {
        let (mut backend, mut surface) = setup(1, 3);
        let rows: Vec<u8> = (1..=3u8).flat_map(|i| [i, i, i, 255]).collect();
        let full = PaintUpdate::new(PaintTarget::Primary, PixelRect::from_size(1, 3), rows);
        apply(&mut backend, surface.as_mut(), SurfaceSize::new(1, 3), &full, ScrollMode::Shift).unwrap();

        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(0, 2, 1, 1), RED)
            .with_scroll(0, -1, PixelRect::from_size(1, 3));
        apply(&mut backend, surface.as_mut(), SurfaceSize::new(1, 3), &update, ScrollMode::Shift).unwrap();

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        assert_eq!(img.pixel(0, 0), Some([2, 2, 2, 255]));
        assert_eq!(img.pixel(0, 1), Some([3, 3, 3, 255]));
        assert_eq!(img.pixel(0, 2), Some(RED));
    }

    #[test]
    fn huge_scroll_delta_only_uploads() {
        let (mut backend, mut surface) = setup(5, 4);
        let full = PaintUpdate::solid(PaintTarget::Primary, PixelRect::from_size(5, 4), [9, 9, 9, 255]);
        apply(&mut backend, surface.as_mut(), SurfaceSize::new(5, 4), &full, ScrollMode::Shift).unwrap();

        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(0, 0, 1, 1), RED)
            .with_scroll(i32::MAX, 0, PixelRect::new(1, 0, 4, 4));
        let outcome =
            apply(&mut backend, surface.as_mut(), SurfaceSize::new(5, 4), &update, ScrollMode::Shift).unwrap();
        assert_eq!(outcome, PaintOutcome::Applied);

        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::new(0, 1, 1, 1), RED)
            .with_scroll(0, i32::MIN, PixelRect::new(1, 1, 4, 3));
        apply(&mut backend, surface.as_mut(), SurfaceSize::new(5, 4), &update, ScrollMode::Shift).unwrap();

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        assert_eq!(img.pixel(0, 0), Some(RED));
        assert_eq!(img.pixel(0, 1), Some(RED));
        assert_eq!(img.pixel(3, 2), Some([9, 9, 9, 255]));
    }

    #[test]
    fn well_formed_checks_stride() {
        let update = PaintUpdate::solid(PaintTarget::Primary, PixelRect::from_size(2, 2), RED).with_stride(4);
        assert!(!update.is_well_formed());
        let empty = PaintUpdate::new(PaintTarget::Primary, PixelRect::from_size(0, 5), Vec::new());
        assert!(empty.is_well_formed());
    }
}
