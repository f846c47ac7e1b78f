//! Selection state of the current scene and the notifications it produces.

pub mod events;
pub mod selection;

pub use events::{ChannelListener, EventNotifier, SelectionListener, ViewerEvent};
pub use selection::{Selected, SelectedEntity, SelectionRegistry, UNNAMED_ENTITY};
