//! The surface bridge and its parts.

mod allocate;
pub mod paint;
pub mod retired;
mod surface_bridge;
pub mod sync;
pub mod transition;
pub mod widgets;

pub use paint::{PaintOutcome, PaintTarget, PaintUpdate, ScrollDelta};
pub use retired::RetiredQueue;
pub use surface_bridge::{SurfaceBridge, SurfaceBridgeBuilder};
pub use sync::{SyncGuard, SyncPolicy};
pub use transition::{FadeDirection, Snapshot, TransitionController};
pub use widgets::{WidgetEntry, WidgetTable};
