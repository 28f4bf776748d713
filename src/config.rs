//! Bridge configuration.
//!
//! `BridgeConfig` controls how a [`SurfaceBridge`](crate::bridge::SurfaceBridge) allocates
//! surfaces, treats scroll hints and paces the load transition. It provides defaults via
//! [`Default`] and a fluent [`BridgeConfig::builder()`] with validation.
//!
//! # Examples
//!
//! ## Use defaults
//! ```rust
//! use surface_bridge::config::BridgeConfig;
//! let cfg = BridgeConfig::default();
//! assert_eq!(cfg.fade_duration.as_millis(), 330);
//! ```
//!
//! ## Customize with the builder
//! ```rust
//! use std::time::Duration;
//! use surface_bridge::config::{AllocationRetry, BridgeConfig, ScrollMode};
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cfg = BridgeConfig::builder()
//!     .fade_duration(Duration::from_millis(500))
//!     .scroll_mode(ScrollMode::Shift)
//!     .allocation_retry(AllocationRetry::None)
//!     .max_blur_radius(8)
//!     .build()?; // returns Result<BridgeConfig, BridgeConfigError>
//! # Ok(()) }
//! ```
//!
//! # Fields (summary)
//! - `fade_duration`: Length of each half of the load transition (default: 330 ms).
//! - `pixel_format`: Format every surface is allocated with.
//! - `allocation_retry`: What to do when the GPU layer refuses an allocation.
//! - `scroll_mode`: Whether scroll hints on paint updates move existing content.
//! - `max_blur_radius`: Blur radius in pixels at full defocus (validated `<= 64`).

use crate::render::PixelFormat;
use std::fmt;
use std::time::Duration;

/// Fallback used when an allocation at the exact size fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AllocationRetry {
    /// Fail straight away.
    None,
    /// Retry once with each dimension rounded up to a power of two.
    #[default]
    PowerOfTwo,
}

/// Treatment of the scroll hint carried by paint updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollMode {
    /// Only the dirty rectangle is uploaded. Scrolled content outside of it is left as is
    /// and has to be repainted by the engine.
    #[default]
    Ignore,
    /// Existing content inside the scroll rectangle is moved by the scroll delta before
    /// the dirty rectangle is uploaded.
    Shift,
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub fade_duration: Duration,
    pub pixel_format: PixelFormat,
    pub allocation_retry: AllocationRetry,
    pub scroll_mode: ScrollMode,
    pub max_blur_radius: u32,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            fade_duration: Duration::from_millis(330),
            pixel_format: PixelFormat::PreMulArgb32,
            allocation_retry: AllocationRetry::PowerOfTwo,
            scroll_mode: ScrollMode::Ignore,
            max_blur_radius: 4,
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Debug, Clone, Default)]
pub struct BridgeConfigBuilder {
    inner: BridgeConfig,
}

impl BridgeConfigBuilder {
    #[inline]
    fn map(mut self, f: impl FnOnce(&mut BridgeConfig)) -> Self {
        f(&mut self.inner);
        self
    }

    pub fn fade_duration(self, d: Duration) -> Self { self.map(|c| c.fade_duration = d) }
    pub fn pixel_format(self, format: PixelFormat) -> Self { self.map(|c| c.pixel_format = format) }
    pub fn allocation_retry(self, retry: AllocationRetry) -> Self { self.map(|c| c.allocation_retry = retry) }
    pub fn scroll_mode(self, mode: ScrollMode) -> Self { self.map(|c| c.scroll_mode = mode) }
    pub fn max_blur_radius(self, px: u32) -> Self { self.map(|c| c.max_blur_radius = px) }

    /// Apply multiple changes in one go.
    pub fn with(self, f: impl FnOnce(&mut BridgeConfig)) -> Self { self.map(f) }

    /// Validate and build the final config.
    pub fn build(self) -> Result<BridgeConfig, BridgeConfigError> {
        validate(&self.inner)?;
        Ok(self.inner)
    }
}

// ---------- Validation ----------

pub const MAX_BLUR_RADIUS: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeConfigError {
    ZeroFadeDuration,
    BlurRadiusTooLarge(u32),
}

impl fmt::Display for BridgeConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeConfigError::ZeroFadeDuration =>
                write!(f, "fade_duration must be longer than zero"),
            BridgeConfigError::BlurRadiusTooLarge(px) =>
                write!(f, "max_blur_radius {px} is out of range (expected 0..={MAX_BLUR_RADIUS})"),
        }
    }
}
impl std::error::Error for BridgeConfigError {}

pub(crate) fn validate(c: &BridgeConfig) -> Result<(), BridgeConfigError> {
    if c.fade_duration.is_zero() {
        return Err(BridgeConfigError::ZeroFadeDuration);
    }
    if c.max_blur_radius > MAX_BLUR_RADIUS {
        return Err(BridgeConfigError::BlurRadiusTooLarge(c.max_blur_radius));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = BridgeConfig::builder().build().unwrap();
        assert_eq!(cfg.fade_duration, Duration::from_millis(330));
        assert_eq!(cfg.scroll_mode, ScrollMode::Ignore);
        assert_eq!(cfg.allocation_retry, AllocationRetry::PowerOfTwo);
    }

    #[test]
    fn zero_duration_is_rejected() {
        let err = BridgeConfig::builder().fade_duration(Duration::ZERO).build().unwrap_err();
        assert_eq!(err, BridgeConfigError::ZeroFadeDuration);
    }

    #[test]
    fn blur_radius_is_bounded() {
        let err = BridgeConfig::builder().max_blur_radius(65).build().unwrap_err();
        assert_eq!(err, BridgeConfigError::BlurRadiusTooLarge(65));
        assert!(BridgeConfig::builder().with(|c| c.max_blur_radius = 64).build().is_ok());
    }
}
