use crate::config::AllocationRetry;
use crate::errors::BridgeError;
use crate::render::{ErasedSurface, PixelFormat, RenderBackend, SurfaceSize};

/// Allocates a surface of at least `size`, retrying with aligned dimensions if the backend
/// refuses the exact size. The returned surface may be larger than `size`.
pub(crate) fn allocate(
    backend: &mut dyn RenderBackend,
    size: SurfaceSize,
    format: PixelFormat,
    retry: AllocationRetry,
) -> Result<Box<dyn ErasedSurface>, BridgeError> {
    let first = match backend.create_surface(size, format) {
        Ok(surface) => return Ok(surface),
        Err(e) => e,
    };

    let aligned = size.next_power_of_two();
    if retry == AllocationRetry::None || aligned == size {
        return Err(BridgeError::AllocationExhausted {
            width: size.width,
            height: size.height,
            source: first,
        });
    }

    log::debug!(
        "{}: {}x{} allocation failed ({first}), retrying at {}x{}",
        backend.name(),
        size.width,
        size.height,
        aligned.width,
        aligned.height
    );

    backend
        .create_surface(aligned, format)
        .map_err(|source| BridgeError::AllocationExhausted {
            width: size.width,
            height: size.height,
            source,
        })
}
