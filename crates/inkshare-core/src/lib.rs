//! InkShare Core Library
//!
//! Drawing-state synchronization for a shared raster canvas: stroke capture,
//! artist roster, the shared layer with undo/redo, and the client side of the
//! session protocol. Rendering and transport are left to the host.

pub mod artist;
pub mod brush;
pub mod canvas;
pub mod config;
pub mod error;
pub mod layer;
pub mod protocol;
pub mod roster;
pub mod session;
pub mod stroke;
pub mod tools;
pub mod transport;
pub mod viewport;

pub use artist::{Artist, ArtistId, ArtistIdentity, ArtistKind, ArtistState, ArtistView};
pub use brush::{BrushSettings, Color, TipType};
pub use canvas::{Canvas, CanvasSnapshot, LiveStroke};
pub use config::{CanvasSettings, SessionConfig};
pub use error::{ConfigError, SyncError, SyncResult};
pub use layer::Layer;
pub use protocol::{ClientEvent, ClientMessage, ServerMessage, SessionSnapshot, SnapshotData, ToolUpdate};
pub use roster::{ArtistRoster, RosterEvent};
pub use session::{JoinState, PointerInput, Session, SessionEvent};
pub use stroke::{CommittedStroke, Stroke, StrokeEngine, StrokeHandle, StrokeNode, StrokePhase};
pub use tools::{ToolKind, ToolManager};
pub use transport::Transport;
pub use viewport::Viewport;
