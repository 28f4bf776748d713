use crate::render::rect::PixelRect;
use std::any::Any;
use uuid::Uuid;

/// Size of a surface in pixels. It's a simple struct to hold width and height.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true when either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Same size, but never smaller than 1x1. Backends refuse empty allocations.
    pub fn at_least_one(&self) -> Self {
        Self {
            width: self.width.max(1),
            height: self.height.max(1),
        }
    }

    /// Component-wise minimum, used when migrating content between surfaces.
    pub fn overlap(&self, other: SurfaceSize) -> Self {
        Self {
            width: self.width.min(other.width),
            height: self.height.min(other.height),
        }
    }

    /// Rounds each dimension up to the next power of two.
    pub fn next_power_of_two(&self) -> Self {
        Self {
            width: self.width.max(1).next_power_of_two(),
            height: self.height.max(1).next_power_of_two(),
        }
    }

    /// Number of bytes in a tightly packed buffer of this size.
    pub fn byte_len(&self, format: PixelFormat) -> usize {
        (self.width as usize) * (self.height as usize) * format.bytes_per_pixel()
    }
}

impl From<PixelRect> for SurfaceSize {
    fn from(rect: PixelRect) -> Self {
        Self {
            width: rect.width,
            height: rect.height,
        }
    }
}

/// Pixel layouts a surface can be allocated with. All of them are 32 bits per pixel.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// Premultiplied ARGB stored little-endian, so bytes are `B, G, R, A`.
    #[default]
    PreMulArgb32,
    /// Premultiplied RGBA, bytes are `R, G, B, A`.
    PreMulRgba32,
}

impl PixelFormat {
    pub const fn bytes_per_pixel(&self) -> usize {
        4
    }
}

/// Identity of an allocated surface. Allocated once per surface and never reused.
///
/// Surfaces are owned by exactly one slot at a time (primary, a widget entry, the
/// retired queue or the transition snapshot). The id allows callers and tests to
/// follow a surface across those ownership transfers without holding a reference.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SurfaceId(Uuid);

impl SurfaceId {
    /// Create a new unique `SurfaceId` using a random UUID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SurfaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixels read back from a surface.
#[derive(Clone)]
pub struct RgbaImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub format: PixelFormat,
}

impl RgbaImage {
    pub fn from_raw(
        pixels: Vec<u8>,
        width: u32,
        height: u32,
        stride: u32,
        format: PixelFormat,
    ) -> anyhow::Result<Self> {
        if pixels.len() < (height as usize) * (stride as usize) {
            anyhow::bail!(
                "pixel buffer too small for image dimensions ({} < {}x{})",
                pixels.len(),
                stride,
                height
            );
        }

        Ok(Self {
            pixels,
            width,
            height,
            stride,
            format,
        })
    }

    /// Creates a tightly packed image filled with a single pixel value.
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: [u8; 4]) -> Self {
        let mut pixels = Vec::with_capacity((width as usize) * (height as usize) * 4);
        for _ in 0..(width as usize) * (height as usize) {
            pixels.extend_from_slice(&pixel);
        }

        Self {
            pixels,
            width,
            height,
            stride: width * 4,
            format,
        }
    }

    /// Returns the four bytes of the pixel at `(x, y)`, or `None` when out of bounds.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize) * (self.stride as usize) + (x as usize) * 4;
        let px = self.pixels.get(idx..idx + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// Returns the row at `y` without stride padding, or `None` when out of bounds.
    pub fn row(&self, y: u32) -> Option<&[u8]> {
        if y >= self.height {
            return None;
        }
        let start = (y as usize) * (self.stride as usize);
        self.pixels.get(start..start + (self.width as usize) * 4)
    }
}

impl std::fmt::Debug for RgbaImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RgbaImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.pixels.len())
            .finish()
    }
}

/// Type-erased surface so the bridge can hold it without generics.
pub trait ErasedSurface: Any + Send {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn id(&self) -> SurfaceId;
    /// Allocated size. Can be larger than what was asked for when the allocation was aligned.
    fn size(&self) -> SurfaceSize;
    fn format(&self) -> PixelFormat;
}

impl<'a> std::fmt::Debug for dyn ErasedSurface + 'a {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ErasedSurface")
            .field("id", &self.id())
            .field("size", &self.size())
            .finish()
    }
}

/// GPU layer interface. Calls occur on whatever context currently drives the bridge;
/// serialization against the host's draw path is the job of the bridge's `SyncPolicy`.
pub trait RenderBackend {
    /// Name of the backend, used in logging.
    fn name(&self) -> &str;

    /// Allocates a new surface. Fails when the GPU layer cannot provide one with these
    /// exact dimensions (too large, unsupported alignment, out of memory).
    fn create_surface(&mut self, size: SurfaceSize, format: PixelFormat) -> anyhow::Result<Box<dyn ErasedSurface>>;

    /// Uploads `pixels` (rows of `stride` bytes) into `rect` of the surface.
    /// `rect` is guaranteed to lie within the surface.
    fn upload(&mut self, surface: &mut dyn ErasedSurface, rect: PixelRect, pixels: &[u8], stride: u32) -> anyhow::Result<()>;

    /// Copies the `size` rectangle anchored at the origin from `src` into `dst`.
    fn copy_region(&mut self, src: &dyn ErasedSurface, dst: &mut dyn ErasedSurface, size: SurfaceSize) -> anyhow::Result<()>;

    /// Moves the content of `region` by `(dx, dy)`. Pixels moved outside `region` are
    /// discarded, the uncovered part of `region` keeps whatever it contained.
    fn shift_region(&mut self, surface: &mut dyn ErasedSurface, region: PixelRect, dx: i32, dy: i32) -> anyhow::Result<()>;

    /// Binds the surface as the active texture for drawing (or unbinds with `None`).
    fn bind(&mut self, surface: Option<&dyn ErasedSurface>);

    /// Releases the surface. The surface is gone once this returns.
    fn dispose(&mut self, surface: Box<dyn ErasedSurface>);

    /// Reads the full surface back into CPU memory.
    fn read_pixels(&self, surface: &dyn ErasedSurface) -> anyhow::Result<RgbaImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_size_helpers() {
        let size = SurfaceSize::new(800, 600);
        assert!(!size.is_empty());
        assert_eq!(size.next_power_of_two(), SurfaceSize::new(1024, 1024));
        assert_eq!(size.overlap(SurfaceSize::new(1024, 300)), SurfaceSize::new(800, 300));
        assert_eq!(SurfaceSize::new(0, 5).at_least_one(), SurfaceSize::new(1, 5));
        assert!(SurfaceSize::new(0, 5).is_empty());
        assert_eq!(SurfaceSize::new(2, 3).byte_len(PixelFormat::PreMulArgb32), 24);
    }

    #[test]
    fn power_of_two_keeps_exact_powers() {
        assert_eq!(SurfaceSize::new(512, 64).next_power_of_two(), SurfaceSize::new(512, 64));
    }

    #[test]
    fn rgba_image_rejects_short_buffer() {
        assert!(RgbaImage::from_raw(vec![0; 10], 2, 2, 8, PixelFormat::PreMulArgb32).is_err());
        assert!(RgbaImage::from_raw(vec![0; 16], 2, 2, 8, PixelFormat::PreMulArgb32).is_ok());
    }

    #[test]
    fn rgba_image_pixel_lookup() {
        let img = RgbaImage::filled(3, 2, PixelFormat::PreMulArgb32, [1, 2, 3, 4]);
        assert_eq!(img.pixel(2, 1), Some([1, 2, 3, 4]));
        assert_eq!(img.pixel(3, 0), None);
        assert_eq!(img.row(1).map(<[u8]>::len), Some(12));
        assert_eq!(img.row(2), None);
    }

    #[test]
    fn surface_ids_are_unique() {
        assert_ne!(SurfaceId::new(), SurfaceId::new());
    }
}
