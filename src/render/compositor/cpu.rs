//! Software compositor.
//!
//! Flattens a [`Frame`](super::Frame) into a single premultiplied image. Hosts without a
//! GPU draw path use it directly; it is also what the demo writes to disk.

use crate::render::backend::{ErasedSurface, PixelFormat, RenderBackend, RgbaImage, SurfaceSize};
use crate::render::compositor::{CompositorSink, LayerStyle};
use crate::render::rect::Offset;
use anyhow::Result;

type Premul = [u8; 4];

/// Flattens frames into an owned canvas.
pub struct CpuCompositor {
    canvas: RgbaImage,
    background: Premul,
    max_blur_radius: u32,
}

impl CpuCompositor {
    pub fn new(width: u32, height: u32, background: Premul, max_blur_radius: u32) -> Self {
        Self {
            canvas: RgbaImage::filled(width, height, PixelFormat::PreMulArgb32, [0, 0, 0, 0]),
            background,
            max_blur_radius,
        }
    }

    /// Result of the last presented frame.
    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    fn blend_at(&mut self, src: &RgbaImage, offset: Offset, visible: SurfaceSize, opacity: f32) {
        let visible = visible.overlap(SurfaceSize::new(src.width, src.height));
        for sy in 0..visible.height {
            let dy = offset.y as i64 + sy as i64;
            if dy < 0 || dy >= self.canvas.height as i64 {
                continue;
            }
            for sx in 0..visible.width {
                let dx = offset.x as i64 + sx as i64;
                if dx < 0 || dx >= self.canvas.width as i64 {
                    continue;
                }
                let si = (sy as usize) * (src.stride as usize) + (sx as usize) * 4;
                let di = (dy as usize) * (self.canvas.stride as usize) + (dx as usize) * 4;

                let s = [src.pixels[si], src.pixels[si + 1], src.pixels[si + 2], src.pixels[si + 3]];
                let d = [
                    self.canvas.pixels[di],
                    self.canvas.pixels[di + 1],
                    self.canvas.pixels[di + 2],
                    self.canvas.pixels[di + 3],
                ];
                self.canvas.pixels[di..di + 4].copy_from_slice(&over(d, s, opacity));
            }
        }
    }
}

impl CompositorSink for CpuCompositor {
    fn begin_frame(&mut self) -> Result<()> {
        self.canvas.pixels.fill(0);
        Ok(())
    }

    fn draw_background(&mut self) -> Result<()> {
        for px in self.canvas.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&self.background);
        }
        Ok(())
    }

    fn draw_surface(
        &mut self,
        backend: &dyn RenderBackend,
        surface: &dyn ErasedSurface,
        offset: Offset,
        visible: SurfaceSize,
        style: LayerStyle,
    ) -> Result<()> {
        if style.opacity <= 0.0 || visible.is_empty() {
            return Ok(());
        }

        let mut pixels = backend.read_pixels(surface)?;
        let radius = (style.blur * self.max_blur_radius as f32).round() as u32;
        if radius > 0 {
            pixels = blur(&pixels, radius);
        }

        self.blend_at(&pixels, offset, visible, style.opacity);
        Ok(())
    }
}

/// Source-over for premultiplied pixels, with an extra layer opacity.
pub fn over(dst: Premul, src: Premul, opacity: f32) -> Premul {
    let op = (opacity.clamp(0.0, 1.0) * 255.0).round() as u16;
    if op == 0 || src[3] == 0 {
        return dst;
    }

    let sa = mul_div255(src[3] as u16, op);
    let inv = 255 - sa as u16;

    let mut out = [0u8; 4];
    for i in 0..4 {
        let s = mul_div255(src[i] as u16, op);
        let d = mul_div255(dst[i] as u16, inv);
        out[i] = s.saturating_add(d);
    }
    out
}

fn mul_div255(x: u16, y: u16) -> u8 {
    ((x as u32 * y as u32 + 127) / 255) as u8
}

/// Separable gaussian blur of a premultiplied image, edges clamped.
pub fn blur(src: &RgbaImage, radius: u32) -> RgbaImage {
    if radius == 0 || src.width == 0 || src.height == 0 {
        return src.clone();
    }

    let kernel = gaussian_kernel(radius);
    let (w, h) = (src.width as usize, src.height as usize);

    let mut packed = Vec::with_capacity(w * h * 4);
    for row in (0..src.height).filter_map(|y| src.row(y)) {
        packed.extend_from_slice(row);
    }
    packed.resize(w * h * 4, 0);

    let mut tmp = vec![0u8; w * h * 4];
    convolve(&packed, &mut tmp, w, h, &kernel, true);
    let mut out = vec![0u8; w * h * 4];
    convolve(&tmp, &mut out, w, h, &kernel, false);

    RgbaImage {
        pixels: out,
        width: src.width,
        height: src.height,
        stride: src.width * 4,
        format: src.format,
    }
}

fn gaussian_kernel(radius: u32) -> Vec<f32> {
    let sigma = (radius as f32 / 2.0).max(0.5);
    let r = radius as i32;
    let mut weights: Vec<f32> = (-r..=r).map(|i| (-(i * i) as f32 / (2.0 * sigma * sigma)).exp()).collect();
    let sum: f32 = weights.iter().sum();
    for w in weights.iter_mut() {
        *w /= sum;
    }
    weights
}

fn convolve(src: &[u8], dst: &mut [u8], w: usize, h: usize, kernel: &[f32], horizontal: bool) {
    let radius = (kernel.len() / 2) as i64;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0f32; 4];
            for (k, weight) in kernel.iter().enumerate() {
                let d = k as i64 - radius;
                let (sx, sy) = if horizontal {
                    ((x as i64 + d).clamp(0, w as i64 - 1) as usize, y)
                } else {
                    (x, (y as i64 + d).clamp(0, h as i64 - 1) as usize)
                };
                let idx = (sy * w + sx) * 4;
                for c in 0..4 {
                    acc[c] += weight * src[idx + c] as f32;
                }
            }
            let out = (y * w + x) * 4;
            for c in 0..4 {
                dst[out + c] = acc[c].round().clamp(0.0, 255.0) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_respects_opacity() {
        let black = [0, 0, 0, 255];
        let red = [0, 0, 255, 255];
        assert_eq!(over(black, red, 1.0), red);
        assert_eq!(over(black, red, 0.0), black);

        let half = over(black, red, 0.5);
        assert!(half[2] > 120 && half[2] < 135, "got {half:?}");
        assert_eq!(half[3], 255);
    }

    #[test]
    fn over_transparent_source_is_noop() {
        assert_eq!(over([1, 2, 3, 4], [0, 0, 0, 0], 1.0), [1, 2, 3, 4]);
    }

    #[test]
    fn blur_keeps_uniform_images_uniform() {
        let img = RgbaImage::filled(6, 4, PixelFormat::PreMulArgb32, [10, 20, 30, 255]);
        let out = blur(&img, 2);
        for y in 0..4 {
            for x in 0..6 {
                assert_eq!(out.pixel(x, y), Some([10, 20, 30, 255]));
            }
        }
    }

    #[test]
    fn blur_spreads_a_single_pixel() {
        let mut img = RgbaImage::filled(5, 5, PixelFormat::PreMulArgb32, [0, 0, 0, 0]);
        let center = (2 * 5 + 2) * 4;
        img.pixels[center..center + 4].copy_from_slice(&[255, 255, 255, 255]);

        let out = blur(&img, 1);
        let c = out.pixel(2, 2).unwrap();
        let n = out.pixel(2, 1).unwrap();
        assert!(c[3] < 255);
        assert!(n[3] > 0);
        assert!(c[3] > n[3]);
    }

    #[test]
    fn kernel_is_normalized() {
        let sum: f32 = gaussian_kernel(3).iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
    }
}
