use crate::events::WidgetId;
use crate::render::{ErasedSurface, RenderBackend, SurfaceId};
use std::collections::VecDeque;

/// Surfaces of destroyed widgets waiting to be disposed.
///
/// A draw that started before the widget was destroyed may still reference its surface,
/// so disposal waits until the host calls the drain at a point where it is not drawing.
#[derive(Default)]
pub struct RetiredQueue {
    entries: VecDeque<(WidgetId, Box<dyn ErasedSurface>)>,
}

impl RetiredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, widget: WidgetId, surface: Box<dyn ErasedSurface>) {
        self.entries.push_back((widget, surface));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns true when a surface of `widget` is waiting for disposal.
    pub fn contains(&self, widget: WidgetId) -> bool {
        self.entries.iter().any(|(w, _)| *w == widget)
    }

    /// Surface retired for `widget`, oldest first.
    pub fn surface(&self, widget: WidgetId) -> Option<&dyn ErasedSurface> {
        self.entries
            .iter()
            .find(|(w, _)| *w == widget)
            .map(|(_, s)| s.as_ref())
    }

    /// Ids of all queued surfaces, in retirement order.
    pub fn surface_ids(&self) -> Vec<SurfaceId> {
        self.entries.iter().map(|(_, s)| s.id()).collect()
    }

    /// Disposes every queued surface, in the order they were retired.
    pub(crate) fn drain(&mut self, backend: &mut dyn RenderBackend) -> usize {
        let count = self.entries.len();
        while let Some((widget, surface)) = self.entries.pop_front() {
            log::trace!("disposing retired surface {} of {}", surface.id(), widget);
            backend.dispose(surface);
        }
        count
    }
}

impl std::fmt::Debug for RetiredQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetiredQueue").field("len", &self.entries.len()).finish()
    }
}
