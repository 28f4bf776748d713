//! Connection between the bridge and the rendering engine.
//!
//! The engine may run on any thread. It pushes [`BridgeEvent`]s through an
//! [`EventSender`]; the bridge collects them whenever it pumps the link, on whichever
//! context drives it. Commands travel the other way.

use crate::errors::BridgeError;
use crate::events::{BridgeEvent, EngineCommand};
use tokio::sync::mpsc;

/// Event source and command sink as seen by the bridge.
pub trait EngineLink {
    /// Sends a command to the engine.
    fn send_command(&mut self, cmd: EngineCommand) -> Result<(), BridgeError>;

    /// Returns every event the engine has delivered so far, in delivery order. Must not
    /// block waiting for new events.
    fn pump(&mut self) -> Vec<BridgeEvent>;
}

/// [`EngineLink`] over a pair of unbounded tokio channels.
#[derive(Debug)]
pub struct ChannelLink {
    event_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    cmd_tx: mpsc::UnboundedSender<EngineCommand>,
}

impl ChannelLink {
    /// Creates the link together with the engine-side ends: a sender for events and a
    /// receiver for commands.
    pub fn new() -> (Self, EventSender, mpsc::UnboundedReceiver<EngineCommand>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel::<BridgeEvent>();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<EngineCommand>();

        (Self { event_rx, cmd_tx }, EventSender { event_tx }, cmd_rx)
    }
}

impl EngineLink for ChannelLink {
    fn send_command(&mut self, cmd: EngineCommand) -> Result<(), BridgeError> {
        self.cmd_tx.send(cmd).map_err(|_| BridgeError::LinkClosed)
    }

    fn pump(&mut self) -> Vec<BridgeEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = self.event_rx.try_recv() {
            events.push(ev);
        }
        events
    }
}

/// Engine-side handle used to deliver events. Cheap to clone, usable from any thread.
#[derive(Clone, Debug)]
pub struct EventSender {
    event_tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl EventSender {
    pub fn send(&self, event: BridgeEvent) -> Result<(), BridgeError> {
        self.event_tx.send(event).map_err(|_| BridgeError::LinkClosed)
    }

    /// Returns true once the bridge side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.event_tx.is_closed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::WidgetId;

    #[test]
    fn pump_returns_events_in_order() {
        let (mut link, tx, _cmd_rx) = ChannelLink::new();
        tx.send(BridgeEvent::LoadingStateChanged { is_loading: true }).unwrap();
        tx.send(BridgeEvent::WidgetDestroyed { widget: WidgetId::new(3) }).unwrap();

        let events = link.pump();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], BridgeEvent::LoadingStateChanged { is_loading: true }));
        assert!(matches!(events[1], BridgeEvent::WidgetDestroyed { .. }));
        assert!(link.pump().is_empty());
    }

    #[test]
    fn commands_reach_the_engine() {
        let (mut link, _tx, mut cmd_rx) = ChannelLink::new();
        link.send_command(EngineCommand::Resized { width: 4, height: 2 }).unwrap();
        assert_eq!(cmd_rx.try_recv().unwrap(), EngineCommand::Resized { width: 4, height: 2 });

        drop(cmd_rx);
        assert!(matches!(
            link.send_command(EngineCommand::Resized { width: 1, height: 1 }),
            Err(BridgeError::LinkClosed)
        ));
    }

    #[tokio::test]
    async fn events_cross_tasks() {
        let (mut link, tx, _cmd_rx) = ChannelLink::new();

        let task = tokio::spawn(async move {
            for raw in 0..5 {
                tx.send(BridgeEvent::WidgetDestroyed { widget: WidgetId::new(raw) }).unwrap();
            }
        });
        task.await.unwrap();

        let ids: Vec<u64> = link
            .pump()
            .into_iter()
            .filter_map(|ev| match ev {
                BridgeEvent::WidgetDestroyed { widget } => Some(widget.raw()),
                _ => None,
            })
            .collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn sender_notices_dropped_link() {
        let (link, tx, _cmd_rx) = ChannelLink::new();
        assert!(!tx.is_closed());
        drop(link);
        assert!(tx.is_closed());
        assert!(tx.send(BridgeEvent::LoadingStateChanged { is_loading: false }).is_err());
    }
}
