//! Session participants.

use kurbo::Point;
use serde::{Deserialize, Serialize};

use crate::brush::{BrushSettings, Color};
use crate::tools::{ToolKind, ToolManager};

/// Opaque identifier assigned by the server on connect.
pub type ArtistId = String;

/// Whether an artist is driven by this client's input or by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtistKind {
    Local,
    Remote,
}

/// Display identity of an artist as announced by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistIdentity {
    pub id: ArtistId,
    pub name: String,
    pub owner: bool,
    pub color: Color,
}

/// Tool state of one artist, as carried in snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtistState {
    pub id: ArtistId,
    pub brush_settings: BrushSettings,
    pub eraser_settings: BrushSettings,
    pub tool: ToolKind,
}

/// A participant of the session.
///
/// The roster owns every `Artist`; observers only ever see [`ArtistView`]
/// copies.
#[derive(Debug, Clone)]
pub struct Artist {
    kind: ArtistKind,
    pub id: ArtistId,
    pub name: String,
    pub color: Color,
    pub owner: bool,
    pub brush_settings: BrushSettings,
    pub eraser_settings: BrushSettings,
    pub tools: ToolManager,
    /// Last pointer position in canvas space.
    pub cursor: Option<Point>,
}

impl Artist {
    /// The local artist before the server has assigned an identity.
    pub fn local(brush: BrushSettings, eraser: BrushSettings) -> Self {
        Self {
            kind: ArtistKind::Local,
            id: ArtistId::new(),
            name: String::new(),
            color: Color::white(),
            owner: false,
            brush_settings: brush,
            eraser_settings: eraser,
            tools: ToolManager::new(),
            cursor: None,
        }
    }

    pub fn remote(identity: ArtistIdentity, brush: BrushSettings, eraser: BrushSettings) -> Self {
        let mut artist = Self::local(brush, eraser);
        artist.kind = ArtistKind::Remote;
        artist.set_identity(identity);
        artist
    }

    pub fn kind(&self) -> ArtistKind {
        self.kind
    }

    pub fn is_local(&self) -> bool {
        self.kind == ArtistKind::Local
    }

    /// Whether the server has assigned an id yet.
    pub fn has_identity(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn set_identity(&mut self, identity: ArtistIdentity) {
        self.id = identity.id;
        self.name = identity.name;
        self.owner = identity.owner;
        self.color = identity.color;
    }

    pub fn identity(&self) -> ArtistIdentity {
        ArtistIdentity {
            id: self.id.clone(),
            name: self.name.clone(),
            owner: self.owner,
            color: self.color,
        }
    }

    pub fn tool(&self) -> ToolKind {
        self.tools.selected_tool()
    }

    /// Settings used by a stroke started with the current tool.
    pub fn stroke_settings(&self, erase: bool) -> &BrushSettings {
        if erase {
            &self.eraser_settings
        } else {
            &self.brush_settings
        }
    }

    pub fn state(&self) -> ArtistState {
        ArtistState {
            id: self.id.clone(),
            brush_settings: self.brush_settings.clone(),
            eraser_settings: self.eraser_settings.clone(),
            tool: self.tool(),
        }
    }

    /// Apply restored tool state.
    pub fn apply_state(&mut self, state: &ArtistState) {
        self.brush_settings = state.brush_settings.clone();
        self.eraser_settings = state.eraser_settings.clone();
        self.tools.select_tool(state.tool);
    }

    pub fn view(&self) -> ArtistView {
        ArtistView {
            kind: self.kind,
            identity: self.identity(),
            tool: self.tool(),
            brush_settings: self.brush_settings.clone(),
            eraser_settings: self.eraser_settings.clone(),
            cursor: self.cursor,
        }
    }
}

/// Read-only copy of an artist handed to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct ArtistView {
    pub kind: ArtistKind,
    pub identity: ArtistIdentity,
    pub tool: ToolKind,
    pub brush_settings: BrushSettings,
    pub eraser_settings: BrushSettings,
    pub cursor: Option<Point>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(id: &str) -> ArtistIdentity {
        ArtistIdentity {
            id: id.into(),
            name: format!("Artist {id}"),
            owner: false,
            color: Color::rgb(10, 20, 30),
        }
    }

    #[test]
    fn test_local_artist_starts_without_identity() {
        let artist = Artist::local(
            BrushSettings::default_brush(),
            BrushSettings::default_eraser(),
        );
        assert!(artist.is_local());
        assert!(!artist.has_identity());
        assert_eq!(artist.tool(), ToolKind::Brush);
    }

    #[test]
    fn test_state_roundtrip() {
        let mut a = Artist::remote(
            identity("a"),
            BrushSettings::default_brush(),
            BrushSettings::default_eraser(),
        );
        a.brush_settings.size = 42.0;
        a.tools.select_tool(ToolKind::Eraser);
        let state = a.state();

        let mut b = Artist::remote(
            identity("a"),
            BrushSettings::default_brush(),
            BrushSettings::default_eraser(),
        );
        b.apply_state(&state);
        assert_eq!(b.state(), state);
        assert_eq!(b.kind(), ArtistKind::Remote);
    }

    #[test]
    fn test_artist_state_wire_names() {
        let a = Artist::remote(
            identity("a"),
            BrushSettings::default_brush(),
            BrushSettings::default_eraser(),
        );
        let json = serde_json::to_value(a.state()).unwrap();
        assert!(json.get("brushSettings").is_some());
        assert!(json.get("eraserSettings").is_some());
        assert_eq!(json["tool"], "Brush");
    }
}
