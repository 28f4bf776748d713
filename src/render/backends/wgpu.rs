use crate::render::backend::{ErasedSurface, PixelFormat, RenderBackend, RgbaImage, SurfaceId, SurfaceSize};
use crate::render::rect::PixelRect;
use anyhow::{anyhow, bail, Result};
use std::any::Any;

/// Backend that keeps every surface as a wgpu texture.
///
/// The device and queue are owned by the host; this backend only creates, updates and
/// destroys textures on them.
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    bound: Option<SurfaceId>,
}

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        Self {
            device,
            queue,
            bound: None,
        }
    }

    /// Surface currently bound for drawing.
    pub fn bound(&self) -> Option<SurfaceId> {
        self.bound
    }

    fn texture_format(format: PixelFormat) -> wgpu::TextureFormat {
        match format {
            PixelFormat::PreMulArgb32 => wgpu::TextureFormat::Bgra8Unorm,
            PixelFormat::PreMulRgba32 => wgpu::TextureFormat::Rgba8Unorm,
        }
    }

    fn new_texture(&self, size: SurfaceSize, format: PixelFormat, label: &str) -> wgpu::Texture {
        self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::texture_format(format),
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }
}

fn extent(size: SurfaceSize) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: size.width,
        height: size.height,
        depth_or_array_layers: 1,
    }
}

fn texel(texture: &wgpu::Texture, x: u32, y: u32) -> wgpu::TexelCopyTextureInfo<'_> {
    wgpu::TexelCopyTextureInfo {
        texture,
        mip_level: 0,
        origin: wgpu::Origin3d { x, y, z: 0 },
        aspect: wgpu::TextureAspect::All,
    }
}

fn wgpu_ref(surface: &dyn ErasedSurface) -> Result<&WgpuSurface> {
    surface
        .as_any()
        .downcast_ref::<WgpuSurface>()
        .ok_or_else(|| anyhow!("WgpuBackend used with non-wgpu surface"))
}

impl RenderBackend for WgpuBackend {
    fn name(&self) -> &str {
        "WgpuBackend"
    }

    fn create_surface(&mut self, size: SurfaceSize, format: PixelFormat) -> Result<Box<dyn ErasedSurface>> {
        let max = self.device.limits().max_texture_dimension_2d;
        if size.is_empty() || size.width > max || size.height > max {
            bail!("surface {}x{} outside of device limits (max {})", size.width, size.height, max);
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let texture = self.new_texture(size, format, "bridge surface");
        let validation = pollster::block_on(self.device.pop_error_scope());
        let oom = pollster::block_on(self.device.pop_error_scope());

        if let Some(err) = validation.or(oom) {
            texture.destroy();
            bail!("texture allocation {}x{} failed: {}", size.width, size.height, err);
        }

        Ok(Box::new(WgpuSurface {
            id: SurfaceId::new(),
            texture,
            size,
            format,
        }))
    }

    fn upload(&mut self, surface: &mut dyn ErasedSurface, rect: PixelRect, pixels: &[u8], stride: u32) -> Result<()> {
        let s = wgpu_ref(surface)?;
        if !rect.fits_within(s.size.width, s.size.height) {
            bail!("upload {:?} outside of {}x{} surface", rect, s.size.width, s.size.height);
        }
        if rect.is_empty() {
            return Ok(());
        }

        self.queue.write_texture(
            texel(&s.texture, rect.x as u32, rect.y as u32),
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(stride),
                rows_per_image: Some(rect.height),
            },
            extent(SurfaceSize::from(rect)),
        );
        Ok(())
    }

    fn copy_region(&mut self, src: &dyn ErasedSurface, dst: &mut dyn ErasedSurface, size: SurfaceSize) -> Result<()> {
        let src = wgpu_ref(src)?;
        let dst = wgpu_ref(dst)?;
        let size = size.overlap(src.size).overlap(dst.size);
        if size.is_empty() {
            return Ok(());
        }

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("bridge copy_region"),
        });
        encoder.copy_texture_to_texture(texel(&src.texture, 0, 0), texel(&dst.texture, 0, 0), extent(size));
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn shift_region(&mut self, surface: &mut dyn ErasedSurface, region: PixelRect, dx: i32, dy: i32) -> Result<()> {
        let s = wgpu_ref(surface)?;
        let Some(region) = region.intersect(&PixelRect::from_size(s.size.width, s.size.height)) else {
            return Ok(());
        };
        let Some(target) = region.offset_by(dx, dy).and_then(|moved| moved.intersect(&region)) else {
            return Ok(());
        };
        if dx == 0 && dy == 0 {
            return Ok(());
        }

        // A texture cannot be both source and destination of one copy, bounce through a scratch texture.
        let scratch = self.new_texture(SurfaceSize::from(target), s.format, "bridge scroll scratch");
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("bridge shift_region"),
        });
        encoder.copy_texture_to_texture(
            texel(&s.texture, (target.x - dx) as u32, (target.y - dy) as u32),
            texel(&scratch, 0, 0),
            extent(SurfaceSize::from(target)),
        );
        encoder.copy_texture_to_texture(
            texel(&scratch, 0, 0),
            texel(&s.texture, target.x as u32, target.y as u32),
            extent(SurfaceSize::from(target)),
        );
        self.queue.submit(Some(encoder.finish()));
        scratch.destroy();
        Ok(())
    }

    fn bind(&mut self, surface: Option<&dyn ErasedSurface>) {
        self.bound = surface.map(|s| s.id());
    }

    fn dispose(&mut self, surface: Box<dyn ErasedSurface>) {
        if self.bound == Some(surface.id()) {
            self.bound = None;
        }
        match surface.as_any().downcast_ref::<WgpuSurface>() {
            Some(s) => s.texture.destroy(),
            None => log::warn!("WgpuBackend asked to dispose a non-wgpu surface {}", surface.id()),
        }
    }

    fn read_pixels(&self, surface: &dyn ErasedSurface) -> Result<RgbaImage> {
        let s = wgpu_ref(surface)?;
        let row_len = s.size.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded = row_len.div_ceil(align) * align;

        let buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("bridge readback"),
            size: padded as u64 * s.size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("bridge read_pixels"),
        });
        encoder.copy_texture_to_buffer(
            texel(&s.texture, 0, 0),
            wgpu::TexelCopyBufferInfo {
                buffer: &buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(s.size.height),
                },
            },
            extent(s.size),
        );
        self.queue.submit(Some(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |res| {
            let _ = tx.send(res);
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|_| anyhow!("readback callback dropped"))?
            .map_err(|e| anyhow!("readback map failed: {e}"))?;

        let mut pixels = Vec::with_capacity((row_len * s.size.height) as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded as usize).take(s.size.height as usize) {
                pixels.extend_from_slice(&row[..row_len as usize]);
            }
        }
        buffer.unmap();

        RgbaImage::from_raw(pixels, s.size.width, s.size.height, row_len, s.format)
    }
}

/// A surface backed by a wgpu texture.
pub struct WgpuSurface {
    id: SurfaceId,
    texture: wgpu::Texture,
    size: SurfaceSize,
    format: PixelFormat,
}

impl WgpuSurface {
    /// Texture the host samples from when drawing this surface.
    pub fn texture(&self) -> &wgpu::Texture {
        &self.texture
    }
}

impl ErasedSurface for WgpuSurface {
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
