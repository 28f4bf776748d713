use crate::render::backend::{ErasedSurface, PixelFormat, RenderBackend, RgbaImage, SurfaceId, SurfaceSize};
use crate::render::rect::PixelRect;
use anyhow::{anyhow, bail, Result};
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Allocation limits a [`CpuBackend`] enforces, mimicking constraints of real GPU layers.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuLimits {
    /// Largest width or height that can be allocated.
    pub max_dimension: Option<u32>,
    /// Refuse allocations whose dimensions are not powers of two.
    pub power_of_two_only: bool,
}

/// Counters shared between a [`CpuBackend`] and whoever wants to observe it.
#[derive(Debug, Default)]
pub struct CpuStats {
    allocations: AtomicUsize,
    failed_allocations: AtomicUsize,
    uploads: AtomicUsize,
    disposed: Mutex<Vec<SurfaceId>>,
    bound: Mutex<Option<SurfaceId>>,
}

impl CpuStats {
    pub fn allocations(&self) -> usize {
        self.allocations.load(Ordering::SeqCst)
    }

    pub fn failed_allocations(&self) -> usize {
        self.failed_allocations.load(Ordering::SeqCst)
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    pub fn disposals(&self) -> usize {
        self.disposed.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true when the surface with this id has been disposed.
    pub fn is_disposed(&self, id: SurfaceId) -> bool {
        self.disposed.lock().unwrap_or_else(|e| e.into_inner()).contains(&id)
    }

    /// Surface currently bound as the active texture.
    pub fn bound(&self) -> Option<SurfaceId> {
        *self.bound.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Backend keeping every surface in CPU memory.
///
/// It is the reference implementation of the GPU layer: pixel-exact, synchronous, and
/// observable through [`CpuStats`]. Hosts that composite in software can use it directly.
pub struct CpuBackend {
    limits: CpuLimits,
    stats: Arc<CpuStats>,
}

impl CpuBackend {
    /// Creates a new CPU backend without allocation limits.
    pub fn new() -> Self {
        Self::with_limits(CpuLimits::default())
    }

    pub fn with_limits(limits: CpuLimits) -> Self {
        Self {
            limits,
            stats: Arc::new(CpuStats::default()),
        }
    }

    /// Shared statistics handle. Stays valid after the backend is moved into a bridge.
    pub fn stats(&self) -> Arc<CpuStats> {
        self.stats.clone()
    }

    fn check_limits(&self, size: SurfaceSize) -> Result<()> {
        if size.is_empty() {
            bail!("cannot allocate an empty {}x{} surface", size.width, size.height);
        }
        if let Some(max) = self.limits.max_dimension {
            if size.width > max || size.height > max {
                bail!("surface {}x{} exceeds maximum dimension {}", size.width, size.height, max);
            }
        }
        if self.limits.power_of_two_only && !(size.width.is_power_of_two() && size.height.is_power_of_two()) {
            bail!("surface {}x{} is not a power of two", size.width, size.height);
        }
        Ok(())
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn cpu_ref(surface: &dyn ErasedSurface) -> Result<&CpuSurface> {
    surface
        .as_any()
        .downcast_ref::<CpuSurface>()
        .ok_or_else(|| anyhow!("CpuBackend used with non-CPU surface"))
}

fn cpu_mut(surface: &mut dyn ErasedSurface) -> Result<&mut CpuSurface> {
    surface
        .as_any_mut()
        .downcast_mut::<CpuSurface>()
        .ok_or_else(|| anyhow!("CpuBackend used with non-CPU surface"))
}

impl RenderBackend for CpuBackend {
    fn name(&self) -> &str {
        "CpuBackend"
    }

    fn create_surface(&mut self, size: SurfaceSize, format: PixelFormat) -> Result<Box<dyn ErasedSurface>> {
        if let Err(e) = self.check_limits(size) {
            self.stats.failed_allocations.fetch_add(1, Ordering::SeqCst);
            return Err(e);
        }

        self.stats.allocations.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(CpuSurface::new(size, format)))
    }

    fn upload(&mut self, surface: &mut dyn ErasedSurface, rect: PixelRect, pixels: &[u8], stride: u32) -> Result<()> {
        let s = cpu_mut(surface)?;
        if !rect.fits_within(s.size.width, s.size.height) {
            bail!("upload {:?} outside of {}x{} surface", rect, s.size.width, s.size.height);
        }
        if rect.is_empty() {
            return Ok(());
        }

        let row_len = rect.width as usize * 4;
        let needed = (rect.height as usize - 1) * stride as usize + row_len;
        if (stride as usize) < row_len || pixels.len() < needed {
            bail!("source buffer too small for {:?} with stride {}", rect, stride);
        }

        for row in 0..rect.height as usize {
            let src = &pixels[row * stride as usize..row * stride as usize + row_len];
            let dst = s.offset(rect.x as u32, rect.y as u32 + row as u32);
            s.pixels[dst..dst + row_len].copy_from_slice(src);
        }

        self.stats.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn copy_region(&mut self, src: &dyn ErasedSurface, dst: &mut dyn ErasedSurface, size: SurfaceSize) -> Result<()> {
        let src = cpu_ref(src)?;
        let dst = cpu_mut(dst)?;

        let size = size.overlap(src.size).overlap(dst.size);
        let row_len = size.width as usize * 4;
        for row in 0..size.height {
            let from = src.offset(0, row);
            let to = dst.offset(0, row);
            dst.pixels[to..to + row_len].copy_from_slice(&src.pixels[from..from + row_len]);
        }
        Ok(())
    }

    fn shift_region(&mut self, surface: &mut dyn ErasedSurface, region: PixelRect, dx: i32, dy: i32) -> Result<()> {
        let s = cpu_mut(surface)?;
        let Some(region) = region.intersect(&PixelRect::from_size(s.size.width, s.size.height)) else {
            return Ok(());
        };
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        // Source part of the region that lands inside the region after the move.
        let Some(target) = region.offset_by(dx, dy).and_then(|moved| moved.intersect(&region)) else {
            return Ok(());
        };

        let row_len = target.width as usize * 4;
        let mut rows = Vec::with_capacity(target.height as usize);
        for row in 0..target.height as i32 {
            let from = s.offset((target.x - dx) as u32, (target.y - dy + row) as u32);
            rows.push(s.pixels[from..from + row_len].to_vec());
        }
        for (row, data) in rows.iter().enumerate() {
            let to = s.offset(target.x as u32, target.y as u32 + row as u32);
            s.pixels[to..to + row_len].copy_from_slice(data);
        }
        Ok(())
    }

    fn bind(&mut self, surface: Option<&dyn ErasedSurface>) {
        *self.stats.bound.lock().unwrap_or_else(|e| e.into_inner()) = surface.map(|s| s.id());
    }

    fn dispose(&mut self, surface: Box<dyn ErasedSurface>) {
        let id = surface.id();
        {
            let mut bound = self.stats.bound.lock().unwrap_or_else(|e| e.into_inner());
            if *bound == Some(id) {
                *bound = None;
            }
        }
        self.stats.disposed.lock().unwrap_or_else(|e| e.into_inner()).push(id);
        drop(surface);
    }

    fn read_pixels(&self, surface: &dyn ErasedSurface) -> Result<RgbaImage> {
        let s = cpu_ref(surface)?;
        RgbaImage::from_raw(s.pixels.to_vec(), s.size.width, s.size.height, s.stride, s.format)
    }
}

/// A surface living in system memory.
pub struct CpuSurface {
    id: SurfaceId,
    size: SurfaceSize,
    format: PixelFormat,
    stride: u32,
    pixels: Box<[u8]>,
}

impl CpuSurface {
    fn new(size: SurfaceSize, format: PixelFormat) -> Self {
        let stride = size.width * format.bytes_per_pixel() as u32;

        Self {
            id: SurfaceId::new(),
            size,
            format,
            stride,
            pixels: vec![0u8; (size.height as usize) * (stride as usize)].into_boxed_slice(),
        }
    }

    #[inline]
    fn offset(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.stride as usize) + (x as usize) * 4
    }

    /// Cheap read-only borrow of the pixels (no copy).
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    #[inline]
    pub fn stride(&self) -> u32 {
        self.stride
    }
}

impl ErasedSurface for CpuSurface {
    fn as_any(&self) -> &dyn Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
    fn id(&self) -> SurfaceId {
        self.id
    }
    fn size(&self) -> SurfaceSize {
        self.size
    }
    fn format(&self) -> PixelFormat {
        self.format
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RED: [u8; 4] = [0, 0, 255, 255];

    fn solid(width: u32, height: u32, px: [u8; 4]) -> Vec<u8> {
        RgbaImage::filled(width, height, PixelFormat::PreMulArgb32, px).pixels
    }

    #[test]
    fn create_respects_limits() {
        let mut backend = CpuBackend::with_limits(CpuLimits {
            max_dimension: Some(1024),
            power_of_two_only: true,
        });
        let stats = backend.stats();

        assert!(backend.create_surface(SurfaceSize::new(800, 600), PixelFormat::PreMulArgb32).is_err());
        assert!(backend.create_surface(SurfaceSize::new(2048, 2048), PixelFormat::PreMulArgb32).is_err());
        assert!(backend.create_surface(SurfaceSize::new(1024, 1024), PixelFormat::PreMulArgb32).is_ok());
        assert!(backend.create_surface(SurfaceSize::new(0, 4), PixelFormat::PreMulArgb32).is_err());

        assert_eq!(stats.allocations(), 1);
        assert_eq!(stats.failed_allocations(), 3);
    }

    #[test]
    fn upload_writes_only_the_rect() {
        let mut backend = CpuBackend::new();
        let mut surface = backend.create_surface(SurfaceSize::new(4, 4), PixelFormat::PreMulArgb32).unwrap();

        backend.upload(surface.as_mut(), PixelRect::new(1, 1, 2, 2), &solid(2, 2, RED), 8).unwrap();

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        assert_eq!(img.pixel(1, 1), Some(RED));
        assert_eq!(img.pixel(2, 2), Some(RED));
        assert_eq!(img.pixel(0, 0), Some([0, 0, 0, 0]));
        assert_eq!(img.pixel(3, 3), Some([0, 0, 0, 0]));
    }

    #[test]
    fn upload_honors_padded_stride() {
        let mut backend = CpuBackend::new();
        let mut surface = backend.create_surface(SurfaceSize::new(2, 2), PixelFormat::PreMulArgb32).unwrap();

        // One pixel per row plus 4 bytes of padding.
        let buf = [1, 2, 3, 4, 9, 9, 9, 9, 5, 6, 7, 8];
        backend.upload(surface.as_mut(), PixelRect::new(0, 0, 1, 2), &buf, 8).unwrap();

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        assert_eq!(img.pixel(0, 0), Some([1, 2, 3, 4]));
        assert_eq!(img.pixel(0, 1), Some([5, 6, 7, 8]));
        assert_eq!(img.pixel(1, 0), Some([0, 0, 0, 0]));
    }

    #[test]
    fn upload_rejects_short_buffer() {
        let mut backend = CpuBackend::new();
        let mut surface = backend.create_surface(SurfaceSize::new(4, 4), PixelFormat::PreMulArgb32).unwrap();
        assert!(backend.upload(surface.as_mut(), PixelRect::new(0, 0, 4, 4), &[0; 12], 16).is_err());
    }

    #[test]
    fn copy_region_clamps_to_both_surfaces() {
        let mut backend = CpuBackend::new();
        let mut src = backend.create_surface(SurfaceSize::new(4, 2), PixelFormat::PreMulArgb32).unwrap();
        let mut dst = backend.create_surface(SurfaceSize::new(2, 4), PixelFormat::PreMulArgb32).unwrap();
        backend.upload(src.as_mut(), PixelRect::from_size(4, 2), &solid(4, 2, RED), 16).unwrap();

        backend.copy_region(src.as_ref(), dst.as_mut(), SurfaceSize::new(4, 4)).unwrap();

        let img = backend.read_pixels(dst.as_ref()).unwrap();
        assert_eq!(img.pixel(1, 1), Some(RED));
        assert_eq!(img.pixel(1, 2), Some([0, 0, 0, 0]));
    }

    #[test]
    fn shift_region_moves_content() {
        let mut backend = CpuBackend::new();
        let mut surface = backend.create_surface(SurfaceSize::new(1, 4), PixelFormat::PreMulArgb32).unwrap();
        let buf: Vec<u8> = (0..4u8).flat_map(|i| [i, i, i, 255]).collect();
        backend.upload(surface.as_mut(), PixelRect::from_size(1, 4), &buf, 4).unwrap();

        // Scroll content up by one row.
        backend.shift_region(surface.as_mut(), PixelRect::from_size(1, 4), 0, -1).unwrap();

        let img = backend.read_pixels(surface.as_ref()).unwrap();
        assert_eq!(img.pixel(0, 0), Some([1, 1, 1, 255]));
        assert_eq!(img.pixel(0, 2), Some([3, 3, 3, 255]));
        // Uncovered row keeps its old content.
        assert_eq!(img.pixel(0, 3), Some([3, 3, 3, 255]));
    }

    #[test]
    fn dispose_records_and_unbinds() {
        let mut backend = CpuBackend::new();
        let stats = backend.stats();
        let surface = backend.create_surface(SurfaceSize::new(1, 1), PixelFormat::PreMulArgb32).unwrap();
        let id = surface.id();

        backend.bind(Some(surface.as_ref()));
        assert_eq!(stats.bound(), Some(id));

        backend.dispose(surface);
        assert!(stats.is_disposed(id));
        assert_eq!(stats.bound(), None);
        assert_eq!(stats.disposals(), 1);
    }
}
