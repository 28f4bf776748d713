pub mod backend;
pub mod backends;
pub mod compositor;
pub mod rect;

pub use backend::{ErasedSurface, PixelFormat, RenderBackend, RgbaImage, SurfaceId, SurfaceSize};
pub use compositor::{CompositorSink, DrawLayer, Frame, LayerKind, LayerStyle};
pub use rect::{Offset, PixelRect};
