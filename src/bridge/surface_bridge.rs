use crate::bridge::allocate::allocate;
use crate::bridge::paint::{self, PaintOutcome, PaintTarget, PaintUpdate};
use crate::bridge::retired::RetiredQueue;
use crate::bridge::sync::SyncPolicy;
use crate::bridge::transition::{FadeDirection, Snapshot, TransitionController};
use crate::bridge::widgets::{WidgetEntry, WidgetTable};
use crate::clock::{Clock, SystemClock};
use crate::config::{self, BridgeConfig};
use crate::errors::BridgeError;
use crate::events::{BridgeEvent, EngineCommand, HostMessage, WidgetId};
use crate::link::EngineLink;
use crate::messages::MessageRegistry;
use crate::render::{DrawLayer, ErasedSurface, Frame, LayerKind, Offset, PixelRect, RenderBackend, SurfaceSize};
use std::sync::Arc;
use url::Url;

struct PrimarySurface {
    surface: Box<dyn ErasedSurface>,
    /// Size the host asked for. The allocation may be larger.
    logical: SurfaceSize,
}

/// Keeps GPU surfaces in step with a rendering engine.
///
/// The bridge owns the primary surface (the page), one surface per live widget, the queue
/// of retired widget surfaces and the load transition. Engine events reach it either
/// pushed through [`SurfaceBridge::handle_event`] or pulled from its [`EngineLink`] with
/// [`SurfaceBridge::pump_events`]. Once per frame the host drains retired surfaces with
/// [`SurfaceBridge::drain_retired`] and draws what [`SurfaceBridge::composite`] returns.
pub struct SurfaceBridge {
    config: BridgeConfig,
    backend: Box<dyn RenderBackend + Send>,
    link: Box<dyn EngineLink + Send>,
    sync: SyncPolicy,
    clock: Arc<dyn Clock>,
    primary: Option<PrimarySurface>,
    widgets: WidgetTable,
    retired: RetiredQueue,
    transition: TransitionController,
    messages: MessageRegistry,
}

/// Builder for [`SurfaceBridge`].
pub struct SurfaceBridgeBuilder {
    config: BridgeConfig,
    sync: SyncPolicy,
    clock: Arc<dyn Clock>,
}

impl Default for SurfaceBridgeBuilder {
    fn default() -> Self {
        Self {
            config: BridgeConfig::default(),
            sync: SyncPolicy::default(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl SurfaceBridgeBuilder {
    pub fn config(mut self, config: BridgeConfig) -> Self {
        self.config = config;
        self
    }

    /// How surface access is serialized against the host's draw path.
    pub fn sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn build<B, L>(self, backend: B, link: L) -> Result<SurfaceBridge, BridgeError>
    where
        B: RenderBackend + Send + 'static,
        L: EngineLink + Send + 'static,
    {
        config::validate(&self.config)?;

        log::debug!("surface bridge on {} with {:?}", backend.name(), self.sync);
        Ok(SurfaceBridge {
            transition: TransitionController::new(self.config.fade_duration),
            config: self.config,
            backend: Box::new(backend),
            link: Box::new(link),
            sync: self.sync,
            clock: self.clock,
            primary: None,
            widgets: WidgetTable::new(),
            retired: RetiredQueue::new(),
            messages: MessageRegistry::new(),
        })
    }
}

impl SurfaceBridge {
    pub fn builder() -> SurfaceBridgeBuilder {
        SurfaceBridgeBuilder::default()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn sync(&self) -> &SyncPolicy {
        &self.sync
    }

    pub fn backend(&self) -> &dyn RenderBackend {
        self.backend.as_ref()
    }

    pub fn messages(&mut self) -> &mut MessageRegistry {
        &mut self.messages
    }

    pub fn primary_surface(&self) -> Option<&dyn ErasedSurface> {
        self.primary.as_ref().map(|p| p.surface.as_ref())
    }

    /// Size of the page as last set by [`SurfaceBridge::resize`].
    pub fn primary_size(&self) -> Option<SurfaceSize> {
        self.primary.as_ref().map(|p| p.logical)
    }

    pub fn widgets(&self) -> &WidgetTable {
        &self.widgets
    }

    pub fn widget(&self, widget: WidgetId) -> Option<&WidgetEntry> {
        self.widgets.get(widget)
    }

    pub fn retired(&self) -> &RetiredQueue {
        &self.retired
    }

    pub fn transition_state(&self) -> &TransitionController {
        &self.transition
    }

    /// Current transition direction and its progress in `0.0..=1.0`.
    pub fn transition(&self) -> (FadeDirection, f32) {
        (self.transition.direction(), self.transition.progress(self.clock.now()))
    }

    // ****************************************
    // ** Engine events

    /// Pulls every pending event from the link and handles it. Returns the number of
    /// events handled.
    ///
    /// Every event is handled even when one fails; the first failure is returned.
    pub fn pump_events(&mut self) -> Result<usize, BridgeError> {
        let events = self.link.pump();
        let count = events.len();

        let mut first_err = None;
        for ev in events {
            let kind = ev.kind();
            if let Err(e) = self.handle_event(ev) {
                log::warn!("{kind} event failed: {e}");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }

        match first_err {
            Some(e) => Err(e),
            None => Ok(count),
        }
    }

    pub fn handle_event(&mut self, event: BridgeEvent) -> Result<(), BridgeError> {
        match event {
            BridgeEvent::Paint(update) => self.apply_paint(&update).map(|_| ()),
            BridgeEvent::WidgetCreated { widget, rect, z_index } => self.on_widget_created(widget, rect, z_index),
            BridgeEvent::WidgetResized { widget, width, height } => self.on_widget_resized(widget, width, height),
            BridgeEvent::WidgetMoved { widget, x, y } => {
                self.on_widget_moved(widget, x, y);
                Ok(())
            }
            BridgeEvent::WidgetDestroyed { widget } => {
                self.on_widget_destroyed(widget);
                Ok(())
            }
            BridgeEvent::LoadingStateChanged { is_loading } => self.on_loading_state_changed(is_loading),
            BridgeEvent::HostMessage(msg) => {
                self.on_host_message(&msg);
                Ok(())
            }
        }
    }

    /// Writes a dirty rectangle into its target surface.
    ///
    /// Updates for a missing target or reaching past the target's bounds are dropped, which
    /// is reported through the outcome rather than as an error.
    pub fn apply_paint(&mut self, update: &PaintUpdate) -> Result<PaintOutcome, BridgeError> {
        let _guard = self.sync.enter();

        let (surface, logical): (&mut dyn ErasedSurface, SurfaceSize) = match update.target {
            PaintTarget::Primary => match self.primary.as_mut() {
                Some(p) => (p.surface.as_mut(), p.logical),
                None => {
                    log::debug!("dropping paint {:?}: no primary surface", update.rect);
                    return Ok(PaintOutcome::DroppedUnknownTarget);
                }
            },
            PaintTarget::Widget(widget) => match self.widgets.get_mut(widget) {
                Some(entry) => {
                    let visible = entry.visible();
                    (entry.surface_mut(), visible)
                }
                None => {
                    log::debug!("dropping paint {:?}: unknown {widget}", update.rect);
                    return Ok(PaintOutcome::DroppedUnknownTarget);
                }
            },
        };

        paint::apply(self.backend.as_mut(), surface, logical, update, self.config.scroll_mode)
    }

    pub fn on_widget_created(&mut self, widget: WidgetId, rect: PixelRect, z_index: i32) -> Result<(), BridgeError> {
        let _guard = self.sync.enter();

        let size = SurfaceSize::from(rect).at_least_one();
        let surface = allocate(self.backend.as_mut(), size, self.config.pixel_format, self.config.allocation_retry)?;
        log::debug!("{widget} created at {rect:?} (z {z_index}), surface {}", surface.id());
        self.widgets.insert(self.backend.as_mut(), widget, surface, rect, z_index);
        Ok(())
    }

    /// Gives the widget a surface of the new size. The previous surface is disposed before
    /// this returns, so the host must not be drawing it. An unknown widget is registered at
    /// the origin.
    pub fn on_widget_resized(&mut self, widget: WidgetId, width: u32, height: u32) -> Result<(), BridgeError> {
        let _guard = self.sync.enter();

        let size = SurfaceSize::new(width, height).at_least_one();
        let surface = allocate(self.backend.as_mut(), size, self.config.pixel_format, self.config.allocation_retry)?;
        log::debug!("{widget} resized to {width}x{height}, surface {}", surface.id());

        if let Err(surface) = self.widgets.replace_now(self.backend.as_mut(), widget, surface, width, height) {
            self.widgets.insert(
                self.backend.as_mut(),
                widget,
                surface,
                PixelRect::from_size(width, height),
                0,
            );
        }
        Ok(())
    }

    pub fn on_widget_moved(&mut self, widget: WidgetId, x: i32, y: i32) {
        let _guard = self.sync.enter();
        if !self.widgets.moved(widget, x, y) {
            log::debug!("ignoring move of unknown {widget}");
        }
    }

    /// Removes the widget. Its surface stays valid until the next [`SurfaceBridge::drain_retired`].
    pub fn on_widget_destroyed(&mut self, widget: WidgetId) {
        let _guard = self.sync.enter();
        if self.widgets.retire_later(widget, &mut self.retired) {
            log::debug!("{widget} destroyed, {} surface(s) awaiting disposal", self.retired.len());
        } else {
            log::debug!("ignoring destroy of unknown {widget}");
        }
    }

    /// Drives the transition. A load start captures the primary surface before any later
    /// paint can reach it.
    pub fn on_loading_state_changed(&mut self, is_loading: bool) -> Result<(), BridgeError> {
        let now = self.clock.now();

        if !is_loading {
            self.transition.begin_fade_in(now);
            return Ok(());
        }
        if !self.transition.needs_snapshot() {
            log::trace!("load start while already fading out");
            return Ok(());
        }

        let _guard = self.sync.enter();
        let Some(primary) = self.primary.as_ref() else {
            log::debug!("load start without a primary surface, nothing to fade from");
            return Ok(());
        };

        let mut copy = allocate(
            self.backend.as_mut(),
            primary.logical,
            self.config.pixel_format,
            self.config.allocation_retry,
        )?;
        if let Err(e) = self.backend.copy_region(primary.surface.as_ref(), copy.as_mut(), primary.logical) {
            self.backend.dispose(copy);
            return Err(e.into());
        }

        if let Some(old) = self.transition.begin_fade_out(now, Snapshot::new(copy, primary.logical)) {
            self.backend.dispose(old.surface);
        }
        Ok(())
    }

    fn on_host_message(&mut self, msg: &HostMessage) {
        self.messages.dispatch(msg);
    }

    /// Disposes every surface retired since the last drain. Call once per frame, at a point
    /// where the host is not drawing them. Returns the number of surfaces disposed.
    pub fn drain_retired(&mut self) -> usize {
        let _guard = self.sync.enter();
        let count = self.retired.drain(self.backend.as_mut());
        if count > 0 {
            log::debug!("disposed {count} retired surface(s)");
        }
        count
    }

    // ****************************************
    // ** Host side

    /// Resizes the primary surface, keeping the content both sizes have in common.
    ///
    /// The first call creates the primary surface. Events already queued on the link are
    /// handled before the engine is told about the new size, and those it sends in
    /// response are handled before this returns.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), BridgeError> {
        if width == 0 || height == 0 {
            return Err(BridgeError::InvalidDimensions { width, height });
        }
        let size = SurfaceSize::new(width, height);
        if self.primary_size() == Some(size) {
            return Ok(());
        }

        {
            let _guard = self.sync.enter();

            let mut fresh = allocate(self.backend.as_mut(), size, self.config.pixel_format, self.config.allocation_retry)?;
            if let Some(old) = self.primary.take() {
                let overlap = old.logical.overlap(size);
                if let Err(e) = self.backend.copy_region(old.surface.as_ref(), fresh.as_mut(), overlap) {
                    self.backend.dispose(fresh);
                    self.primary = Some(old);
                    return Err(e.into());
                }
                log::debug!(
                    "primary {}x{} -> {}x{}, disposing {}",
                    old.logical.width,
                    old.logical.height,
                    width,
                    height,
                    old.surface.id()
                );
                self.backend.dispose(old.surface);
            }
            self.primary = Some(PrimarySurface {
                surface: fresh,
                logical: size,
            });
        }

        // The primary is already at the new size, so the engine is told even when a
        // queued event fails. The first failure is returned afterwards.
        let before = self.pump_events();
        self.link.send_command(EngineCommand::Resized { width, height })?;
        let after = self.pump_events();
        before?;
        after?;
        Ok(())
    }

    pub fn navigate(&mut self, url: &str) -> Result<(), BridgeError> {
        let url = Url::parse(url)?;
        log::debug!("navigating to {url}");
        self.link.send_command(EngineCommand::Navigate { url })
    }

    /// Live surfaces in draw order with their placement: the primary surface first, then
    /// widgets from the bottom of the stack up.
    pub fn render_list(&self) -> Vec<(&dyn ErasedSurface, Offset)> {
        let mut list = Vec::with_capacity(self.widgets.len() + 1);
        if let Some(primary) = self.primary.as_ref() {
            list.push((primary.surface.as_ref(), Offset::ZERO));
        }
        for (_, entry) in self.widgets.ordered() {
            list.push((entry.surface(), entry.rect().origin()));
        }
        list
    }

    /// Plans the next frame.
    ///
    /// A finished fade in is settled first, releasing the snapshot. The returned frame
    /// holds the sync lock until dropped.
    pub fn composite(&mut self) -> Frame<'_> {
        let now = self.clock.now();
        let guard = self.sync.enter();

        if let Some(released) = self.transition.settle_if_done(now) {
            self.backend.dispose(released.surface);
        }

        let direction = self.transition.direction();
        let progress = self.transition.progress(now);
        let mut layers = vec![DrawLayer::background()];

        if let (Some(snapshot), Some(style)) = (self.transition.snapshot(), self.transition.snapshot_style(now)) {
            layers.push(DrawLayer::surface(
                LayerKind::Snapshot,
                snapshot.surface(),
                Offset::ZERO,
                snapshot.visible(),
                style,
            ));
        }

        if let Some(style) = self.transition.live_style(now) {
            if let Some(primary) = self.primary.as_ref() {
                layers.push(DrawLayer::surface(
                    LayerKind::Primary,
                    primary.surface.as_ref(),
                    Offset::ZERO,
                    primary.logical,
                    style,
                ));
            }
            for (widget, entry) in self.widgets.ordered() {
                layers.push(DrawLayer::surface(
                    LayerKind::Widget(widget),
                    entry.surface(),
                    entry.rect().origin(),
                    entry.visible(),
                    style,
                ));
            }
        }

        Frame::new(layers, direction, progress, self.backend.as_ref(), guard)
    }

    /// Disposes every surface the bridge owns.
    pub fn shutdown(mut self) {
        let _guard = self.sync.enter();

        self.retired.drain(self.backend.as_mut());
        for surface in self.widgets.take_all() {
            self.backend.dispose(surface);
        }
        if let Some(snapshot) = self.transition.reset() {
            self.backend.dispose(snapshot.surface);
        }
        if let Some(primary) = self.primary.take() {
            self.backend.dispose(primary.surface);
        }
        log::debug!("surface bridge on {} shut down", self.backend.name());
    }
}

impl std::fmt::Debug for SurfaceBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurfaceBridge")
            .field("backend", &self.backend.name())
            .field("primary", &self.primary_size())
            .field("widgets", &self.widgets.len())
            .field("retired", &self.retired.len())
            .field("transition", &self.transition)
            .finish()
    }
}
