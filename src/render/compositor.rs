//! Per-frame compositing plan.
//!
//! A [`Frame`] is what the host draw path consumes once per drawn frame: the ordered
//! list of layers to draw (background, transition snapshot, primary surface, widget
//! surfaces) together with the opacity and blur each must be drawn with.
//!
//! The frame borrows the surfaces it references and, when the bridge is configured
//! with an exclusive [`SyncPolicy`](crate::bridge::SyncPolicy), holds its lock. None of
//! those surfaces can therefore be mutated or disposed while the frame is alive.

pub mod cpu;

use crate::bridge::sync::SyncGuard;
use crate::bridge::transition::FadeDirection;
use crate::events::WidgetId;
use crate::render::backend::{ErasedSurface, RenderBackend, SurfaceSize};
use crate::render::rect::Offset;

/// What a layer shows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LayerKind {
    /// The host's own background. Carries no surface.
    Background,
    /// Copy of the primary surface taken when the page started loading.
    Snapshot,
    /// The page itself.
    Primary,
    /// A popup or overlay surface owned by the engine.
    Widget(WidgetId),
}

/// How a layer is drawn.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerStyle {
    /// `0.0` is fully transparent, `1.0` fully opaque.
    pub opacity: f32,
    /// Defocus amount in `0.0..=1.0`. Hosts map it to mip bias or a blur radius.
    pub blur: f32,
}

impl LayerStyle {
    pub const OPAQUE: LayerStyle = LayerStyle { opacity: 1.0, blur: 0.0 };

    pub fn new(opacity: f32, blur: f32) -> Self {
        Self {
            opacity: opacity.clamp(0.0, 1.0),
            blur: blur.clamp(0.0, 1.0),
        }
    }
}

/// A single entry of the frame, drawn in order.
#[derive(Clone, Copy, Debug)]
pub struct DrawLayer<'a> {
    pub kind: LayerKind,
    pub surface: Option<&'a dyn ErasedSurface>,
    pub offset: Offset,
    /// Part of the surface, anchored at its origin, that holds content. Surfaces can be
    /// allocated larger than what they show.
    pub visible: SurfaceSize,
    pub style: LayerStyle,
}

impl<'a> DrawLayer<'a> {
    pub(crate) fn background() -> Self {
        Self {
            kind: LayerKind::Background,
            surface: None,
            offset: Offset::ZERO,
            visible: SurfaceSize::new(0, 0),
            style: LayerStyle::OPAQUE,
        }
    }

    pub(crate) fn surface(
        kind: LayerKind,
        surface: &'a dyn ErasedSurface,
        offset: Offset,
        visible: SurfaceSize,
        style: LayerStyle,
    ) -> Self {
        Self {
            kind,
            surface: Some(surface),
            offset,
            visible,
            style,
        }
    }
}

/// Host-side consumer of a frame.
pub trait CompositorSink {
    /// Called before the first layer of a frame.
    fn begin_frame(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    /// Draws the host background. Always the first layer.
    fn draw_background(&mut self) -> anyhow::Result<()>;

    /// Draws the `visible` part of a surface at `offset` with the given style.
    fn draw_surface(
        &mut self,
        backend: &dyn RenderBackend,
        surface: &dyn ErasedSurface,
        offset: Offset,
        visible: SurfaceSize,
        style: LayerStyle,
    ) -> anyhow::Result<()>;

    /// Called after the last layer of a frame.
    fn end_frame(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// The compositing plan of one frame.
pub struct Frame<'a> {
    layers: Vec<DrawLayer<'a>>,
    direction: FadeDirection,
    progress: f32,
    backend: &'a dyn RenderBackend,
    _guard: SyncGuard<'a>,
}

impl<'a> Frame<'a> {
    pub(crate) fn new(
        layers: Vec<DrawLayer<'a>>,
        direction: FadeDirection,
        progress: f32,
        backend: &'a dyn RenderBackend,
        guard: SyncGuard<'a>,
    ) -> Self {
        Self {
            layers,
            direction,
            progress,
            backend,
            _guard: guard,
        }
    }

    /// Layers in draw order.
    pub fn layers(&self) -> &[DrawLayer<'a>] {
        &self.layers
    }

    /// Transition direction this frame was planned for.
    pub fn direction(&self) -> FadeDirection {
        self.direction
    }

    /// Transition progress in `0.0..=1.0` this frame was planned for.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    /// Backend owning the surfaces of this frame.
    pub fn backend(&self) -> &'a dyn RenderBackend {
        self.backend
    }

    /// Finds the first layer of the given kind.
    pub fn layer(&self, kind: LayerKind) -> Option<&DrawLayer<'a>> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    /// Feeds every layer to `sink`, in order.
    pub fn present(&self, sink: &mut dyn CompositorSink) -> anyhow::Result<()> {
        sink.begin_frame()?;
        for layer in &self.layers {
            match layer.surface {
                None => sink.draw_background()?,
                Some(surface) => sink.draw_surface(self.backend, surface, layer.offset, layer.visible, layer.style)?,
            }
        }
        sink.end_frame()
    }
}

impl std::fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("layers", &self.layers)
            .field("direction", &self.direction)
            .field("progress", &self.progress)
            .finish()
    }
}
