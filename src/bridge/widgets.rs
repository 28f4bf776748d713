use crate::bridge::retired::RetiredQueue;
use crate::events::WidgetId;
use crate::render::{ErasedSurface, PixelRect, RenderBackend, SurfaceSize};
use std::collections::HashMap;

/// A live widget and the surface holding its pixels.
pub struct WidgetEntry {
    surface: Box<dyn ErasedSurface>,
    rect: PixelRect,
    z_index: i32,
    seq: u64,
}

impl WidgetEntry {
    pub fn surface(&self) -> &dyn ErasedSurface {
        self.surface.as_ref()
    }

    pub(crate) fn surface_mut(&mut self) -> &mut dyn ErasedSurface {
        self.surface.as_mut()
    }

    /// Placement and size as last reported by the engine.
    pub fn rect(&self) -> PixelRect {
        self.rect
    }

    /// Visible part of the surface.
    pub fn visible(&self) -> SurfaceSize {
        SurfaceSize::from(self.rect)
    }

    pub fn z_index(&self) -> i32 {
        self.z_index
    }
}

impl std::fmt::Debug for WidgetEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WidgetEntry")
            .field("surface", &self.surface.id())
            .field("rect", &self.rect)
            .field("z_index", &self.z_index)
            .finish()
    }
}

/// Live widget surfaces, keyed by widget.
///
/// There are two ways a surface leaves the table. [`WidgetTable::replace_now`] disposes
/// it on the spot and is used on resize; [`WidgetTable::retire_later`] hands it to the
/// [`RetiredQueue`] and is used on destroy.
#[derive(Default)]
pub struct WidgetTable {
    entries: HashMap<WidgetId, WidgetEntry>,
    next_seq: u64,
}

impl WidgetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a widget. An existing entry for the same widget is replaced and its
    /// surface disposed immediately.
    pub(crate) fn insert(
        &mut self,
        backend: &mut dyn RenderBackend,
        widget: WidgetId,
        surface: Box<dyn ErasedSurface>,
        rect: PixelRect,
        z_index: i32,
    ) {
        let seq = self.next_seq;
        self.next_seq += 1;

        let entry = WidgetEntry {
            surface,
            rect,
            z_index,
            seq,
        };
        if let Some(old) = self.entries.insert(widget, entry) {
            log::warn!("{widget} created twice, disposing surface {}", old.surface.id());
            backend.dispose(old.surface);
        }
    }

    /// Installs `surface` as the new surface of `widget` and disposes the previous one
    /// right away. Nothing may still be drawing the previous surface.
    ///
    /// Returns false (and leaves `surface` unused) when the widget is unknown.
    pub(crate) fn replace_now(
        &mut self,
        backend: &mut dyn RenderBackend,
        widget: WidgetId,
        surface: Box<dyn ErasedSurface>,
        width: u32,
        height: u32,
    ) -> Result<(), Box<dyn ErasedSurface>> {
        let Some(entry) = self.entries.get_mut(&widget) else {
            return Err(surface);
        };
        let old = std::mem::replace(&mut entry.surface, surface);
        entry.rect.resize(width, height);
        backend.dispose(old);
        Ok(())
    }

    /// Removes `widget` and queues its surface for disposal at the next drain.
    pub(crate) fn retire_later(&mut self, widget: WidgetId, retired: &mut RetiredQueue) -> bool {
        match self.entries.remove(&widget) {
            Some(entry) => {
                retired.push(widget, entry.surface);
                true
            }
            None => false,
        }
    }

    /// Moves a widget. Returns false when the widget is unknown.
    pub(crate) fn moved(&mut self, widget: WidgetId, x: i32, y: i32) -> bool {
        match self.entries.get_mut(&widget) {
            Some(entry) => {
                entry.rect.translate(x, y);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, widget: WidgetId) -> Option<&WidgetEntry> {
        self.entries.get(&widget)
    }

    pub(crate) fn get_mut(&mut self, widget: WidgetId) -> Option<&mut WidgetEntry> {
        self.entries.get_mut(&widget)
    }

    pub fn contains(&self, widget: WidgetId) -> bool {
        self.entries.contains_key(&widget)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Widgets in stacking order: lowest z-index first, creation order among equals.
    pub fn ordered(&self) -> Vec<(WidgetId, &WidgetEntry)> {
        let mut list: Vec<_> = self.entries.iter().map(|(id, e)| (*id, e)).collect();
        list.sort_by_key(|(_, e)| (e.z_index, e.seq));
        list
    }

    /// Empties the table, handing back every surface.
    pub(crate) fn take_all(&mut self) -> Vec<Box<dyn ErasedSurface>> {
        self.entries.drain().map(|(_, e)| e.surface).collect()
    }
}

impl std::fmt::Debug for WidgetTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.entries.iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::backends::cpu::CpuBackend;
    use crate::render::PixelFormat;

    fn surface(backend: &mut CpuBackend, w: u32, h: u32) -> Box<dyn ErasedSurface> {
        backend.create_surface(SurfaceSize::new(w, h), PixelFormat::PreMulArgb32).unwrap()
    }

    #[test]
    fn replace_now_disposes_immediately() {
        let mut backend = CpuBackend::new();
        let stats = backend.stats();
        let mut table = WidgetTable::new();
        let w = WidgetId::new(1);

        let first = surface(&mut backend, 10, 10);
        let first_id = first.id();
        table.insert(&mut backend, w, first, PixelRect::new(5, 5, 10, 10), 0);

        let second = surface(&mut backend, 20, 8);
        let second_id = second.id();
        assert!(table.replace_now(&mut backend, w, second, 20, 8).is_ok());

        assert!(stats.is_disposed(first_id));
        let entry = table.get(w).unwrap();
        assert_eq!(entry.surface().id(), second_id);
        assert_eq!(entry.rect(), PixelRect::new(5, 5, 20, 8));
    }

    #[test]
    fn replace_now_hands_back_surface_for_unknown_widget() {
        let mut backend = CpuBackend::new();
        let mut table = WidgetTable::new();
        let s = surface(&mut backend, 1, 1);
        let id = s.id();
        let back = table.replace_now(&mut backend, WidgetId::new(9), s, 1, 1).unwrap_err();
        assert_eq!(back.id(), id);
    }

    #[test]
    fn retire_later_defers_disposal() {
        let mut backend = CpuBackend::new();
        let stats = backend.stats();
        let mut table = WidgetTable::new();
        let mut retired = RetiredQueue::new();
        let w = WidgetId::new(2);

        let s = surface(&mut backend, 4, 4);
        let id = s.id();
        table.insert(&mut backend, w, s, PixelRect::from_size(4, 4), 0);

        assert!(table.retire_later(w, &mut retired));
        assert!(!table.contains(w));
        assert!(!stats.is_disposed(id));
        assert_eq!(retired.surface_ids(), vec![id]);
        assert!(!table.retire_later(w, &mut retired));
    }

    #[test]
    fn ordered_by_z_then_creation() {
        let mut backend = CpuBackend::new();
        let mut table = WidgetTable::new();
        for (raw, z) in [(1, 5), (2, 0), (3, 5), (4, -1)] {
            let s = surface(&mut backend, 1, 1);
            table.insert(&mut backend, WidgetId::new(raw), s, PixelRect::from_size(1, 1), z);
        }
        let order: Vec<u64> = table.ordered().into_iter().map(|(id, _)| id.raw()).collect();
        assert_eq!(order, vec![4, 2, 1, 3]);
    }

    #[test]
    fn moved_updates_placement_only() {
        let mut backend = CpuBackend::new();
        let mut table = WidgetTable::new();
        let w = WidgetId::new(1);
        let s = surface(&mut backend, 3, 2);
        table.insert(&mut backend, w, s, PixelRect::new(0, 0, 3, 2), 0);

        assert!(table.moved(w, 40, -7));
        assert_eq!(table.get(w).unwrap().rect(), PixelRect::new(40, -7, 3, 2));
        assert!(!table.moved(WidgetId::new(5), 1, 1));
    }
}
