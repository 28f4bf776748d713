pub mod bridge;
pub mod clock;
pub mod config;
pub mod errors;
pub mod events;
pub mod link;
pub mod messages;
pub mod render;

pub use bridge::{FadeDirection, PaintOutcome, PaintTarget, PaintUpdate, SurfaceBridge, SyncPolicy};
pub use config::BridgeConfig;
pub use errors::BridgeError;
pub use events::{BridgeEvent, EngineCommand, HostMessage, WidgetId};
pub use link::{ChannelLink, EngineLink, EventSender};
