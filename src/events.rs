//! Engine event types and commands.
//!
//! This module defines what flows between the rendering engine and the bridge: the
//! inbound [`BridgeEvent`] stream (paints, widget lifecycle, load state, page messages)
//! and the outbound [`EngineCommand`]s.
//!
//! # Main Types
//!
//! - [`WidgetId`]: Opaque identity of an engine widget (popup, overlay).
//! - [`BridgeEvent`]: Events emitted by the engine.
//! - [`EngineCommand`]: Commands the bridge sends back to the engine.
//! - [`HostMessage`]: A string message posted by the page to the host.

use crate::bridge::paint::PaintUpdate;
use crate::render::PixelRect;
use std::fmt::Display;
use url::Url;

/// Identity of a widget, assigned by the engine. Stable for the lifetime of the widget.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WidgetId(u64);

impl WidgetId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw token as handed out by the engine.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Display for WidgetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "widget#{}", self.0)
    }
}

/// Message posted by the page to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostMessage {
    /// Message name, used to find a handler.
    pub message: String,
    /// URL of the frame that sent the message.
    pub origin: String,
    /// Target the page addressed the message to.
    pub target: String,
}

impl HostMessage {
    pub fn new(message: impl Into<String>, origin: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: origin.into(),
            target: target.into(),
        }
    }
}

/// Events emitted by the engine towards the bridge
#[derive(Clone, Debug)]
pub enum BridgeEvent {
    // ****************************************
    // ** Pixels
    /// New pixels for the primary surface or a widget
    Paint(PaintUpdate),

    // ****************************************
    // ** Widget lifecycle
    /// A widget appeared at `rect`, stacked by `z_index`
    WidgetCreated { widget: WidgetId, rect: PixelRect, z_index: i32 },
    /// A widget changed size
    WidgetResized { widget: WidgetId, width: u32, height: u32 },
    /// A widget moved to a new position
    WidgetMoved { widget: WidgetId, x: i32, y: i32 },
    /// A widget is gone. Its surface may still be drawn until the next drain.
    WidgetDestroyed { widget: WidgetId },

    // ****************************************
    // ** Page state
    /// The page started (`true`) or finished (`false`) loading
    LoadingStateChanged { is_loading: bool },
    /// Message posted by the page
    HostMessage(HostMessage),
}

impl BridgeEvent {
    /// Short name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeEvent::Paint(_) => "paint",
            BridgeEvent::WidgetCreated { .. } => "widget-created",
            BridgeEvent::WidgetResized { .. } => "widget-resized",
            BridgeEvent::WidgetMoved { .. } => "widget-moved",
            BridgeEvent::WidgetDestroyed { .. } => "widget-destroyed",
            BridgeEvent::LoadingStateChanged { .. } => "loading-state",
            BridgeEvent::HostMessage(_) => "host-message",
        }
    }
}

/// Commands the bridge sends to the engine
#[derive(Clone, Debug, PartialEq)]
pub enum EngineCommand {
    /// Navigate to specific URL
    Navigate { url: Url },
    /// The primary surface now has these dimensions
    Resized { width: u32, height: u32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widget_id_display() {
        assert_eq!(WidgetId::new(7).to_string(), "widget#7");
        assert_eq!(WidgetId::new(7).raw(), 7);
    }

    #[test]
    fn event_kinds() {
        let ev = BridgeEvent::WidgetMoved {
            widget: WidgetId::new(1),
            x: 3,
            y: 4,
        };
        assert_eq!(ev.kind(), "widget-moved");
        let ev = BridgeEvent::LoadingStateChanged { is_loading: true };
        assert_eq!(ev.kind(), "loading-state");
    }

    #[test]
    fn host_message_new() {
        let msg = HostMessage::new("ping", "https://example.org/", "host");
        assert_eq!(msg.message, "ping");
        assert_eq!(msg.target, "host");
    }
}
