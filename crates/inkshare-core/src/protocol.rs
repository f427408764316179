//! Wire messages exchanged between clients and the relay server.
//!
//! Every message is a JSON object `{"type": ..., "body": {...}}`. Pointer
//! coordinates are always in canvas space.

use serde::{Deserialize, Serialize};

use crate::artist::{ArtistId, ArtistIdentity, ArtistState};
use crate::brush::BrushSettings;
use crate::canvas::CanvasSnapshot;
use crate::error::SyncResult;
use crate::stroke::StrokeNode;
use crate::tools::ToolKind;

/// Messages sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum ClientMessage {
    /// Input event of the local artist.
    OnClientEvent(ClientEvent),
    /// Tool, settings or history change of the local artist.
    OnClientToolUpdate(ToolUpdate),
    /// Owner's answer to [`ServerMessage::RequestCurrentState`].
    CurrentState {
        requester: ArtistId,
        data: SnapshotData,
    },
}

/// Messages received from the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "body")]
pub enum ServerMessage {
    /// Another artist joined the room.
    OnClientConnected(ArtistIdentity),
    /// An artist left; `owner_id` names the owner after the departure.
    #[serde(rename = "OnClientDisconected", alias = "OnClientDisconnected")]
    OnClientDisconnected {
        id: ArtistId,
        #[serde(rename = "ownerId", default)]
        owner_id: Option<ArtistId>,
    },
    /// Identity assigned to this client.
    OnSelfConnected(ArtistIdentity),
    /// Join snapshot: the artists already present and the owner's state.
    GetCurrentState(SessionSnapshot),
    /// Sent to the owner when someone joins.
    RequestCurrentState { requester: ArtistId },
    OnClientEvent(RelayedEvent),
    OnClientToolUpdate(RelayedToolUpdate),
    Error { message: String },
}

/// Pointer sample as sent on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerData {
    pub x: f64,
    pub y: f64,
    #[serde(default = "full_pressure")]
    pub pressure: f64,
    /// Button that changed state (0 = primary, 1 = middle).
    #[serde(default)]
    pub button: i16,
    /// Bitmask of pressed buttons.
    #[serde(default)]
    pub buttons: u16,
    /// Sender timestamp in milliseconds.
    #[serde(default)]
    pub t: f64,
}

fn full_pressure() -> f64 {
    1.0
}

impl PointerData {
    pub fn node(&self) -> StrokeNode {
        StrokeNode {
            x: self.x,
            y: self.y,
            pressure: self.pressure,
            t: self.t,
        }
    }

    pub fn is_primary(&self) -> bool {
        self.button == 0
    }
}

/// Input events of one artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data")]
pub enum ClientEvent {
    #[serde(rename = "onMouseDown")]
    MouseDown(PointerData),
    #[serde(rename = "onMouseMove")]
    MouseMove(PointerData),
    #[serde(rename = "onMouseUp")]
    MouseUp(PointerData),
    #[serde(rename = "onKeyboardDown", alias = "keyDown")]
    KeyDown { key: String },
    #[serde(rename = "onKeyboardUp", alias = "keyUp")]
    KeyUp { key: String },
}

/// Tool, settings and history changes of one artist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "eventType", content = "data")]
pub enum ToolUpdate {
    #[serde(rename = "TOOL_TYPE_CHANGE")]
    ToolTypeChange {
        #[serde(rename = "toolType")]
        tool_type: ToolKind,
    },
    #[serde(rename = "BRUSH_SETTINGS_CHANGE")]
    BrushSettingsChange {
        #[serde(rename = "brushSettings")]
        brush_settings: BrushSettings,
    },
    #[serde(rename = "ERASER_SETTINGS_CHANGE")]
    EraserSettingsChange {
        #[serde(rename = "eraserSettings")]
        eraser_settings: BrushSettings,
    },
    #[serde(rename = "UNDO")]
    Undo,
    #[serde(rename = "REDO")]
    Redo,
}

/// A [`ClientEvent`] with the sender id added by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedEvent {
    pub from: ArtistId,
    #[serde(flatten)]
    pub event: ClientEvent,
}

/// A [`ToolUpdate`] with the sender id added by the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayedToolUpdate {
    pub from: ArtistId,
    #[serde(flatten)]
    pub update: ToolUpdate,
}

/// Owner state handed to a joining artist.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SnapshotData {
    #[serde(default)]
    pub artists: Vec<ArtistState>,
    #[serde(default)]
    pub canvas: CanvasSnapshot,
}

/// Body of [`ServerMessage::GetCurrentState`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Artists already in the room, excluding the receiver.
    #[serde(default)]
    pub clients: Vec<ArtistIdentity>,
    /// `None` when the receiver is the first artist in the room.
    #[serde(default)]
    pub data: Option<SnapshotData>,
    /// The artist whose state `data` is.
    #[serde(default)]
    pub source: Option<ArtistId>,
}

impl ClientMessage {
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> SyncResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> SyncResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The artist a relayed live event is attributed to.
    pub fn sender(&self) -> Option<&str> {
        match self {
            ServerMessage::OnClientEvent(relayed) => Some(&relayed.from),
            ServerMessage::OnClientToolUpdate(relayed) => Some(&relayed.from),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SyncError;
    use serde_json::json;

    #[test]
    fn test_client_event_wire_format() {
        let msg = ClientMessage::OnClientEvent(ClientEvent::MouseDown(PointerData {
            x: 1.5,
            y: 2.0,
            pressure: 0.5,
            button: 0,
            buttons: 1,
            t: 10.0,
        }));
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "OnClientEvent");
        assert_eq!(value["body"]["eventType"], "onMouseDown");
        assert_eq!(value["body"]["data"]["x"], 1.5);
    }

    #[test]
    fn test_relayed_event_parses() {
        let raw = json!({
            "type": "OnClientEvent",
            "body": {
                "from": "a",
                "eventType": "onMouseMove",
                "data": {"x": 3.0, "y": 4.0}
            }
        });
        let msg = ServerMessage::from_json(&raw.to_string()).unwrap();
        match &msg {
            ServerMessage::OnClientEvent(RelayedEvent {
                from,
                event: ClientEvent::MouseMove(data),
            }) => {
                assert_eq!(from, "a");
                assert_eq!(data.pressure, 1.0);
                assert_eq!(data.button, 0);
            }
            other => panic!("unexpected message: {:?}", other),
        }
        assert_eq!(msg.sender(), Some("a"));
    }

    #[test]
    fn test_tool_updates() {
        let raw = json!({
            "type": "OnClientToolUpdate",
            "body": {"from": "b", "eventType": "TOOL_TYPE_CHANGE", "data": {"toolType": "Eraser"}}
        });
        let msg = ServerMessage::from_json(&raw.to_string()).unwrap();
        assert_eq!(
            msg,
            ServerMessage::OnClientToolUpdate(RelayedToolUpdate {
                from: "b".into(),
                update: ToolUpdate::ToolTypeChange {
                    tool_type: ToolKind::Eraser
                },
            })
        );

        let raw = json!({"type": "OnClientToolUpdate", "body": {"from": "b", "eventType": "UNDO"}});
        let msg = ServerMessage::from_json(&raw.to_string()).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::OnClientToolUpdate(RelayedToolUpdate {
                update: ToolUpdate::Undo,
                ..
            })
        ));
    }

    #[test]
    fn test_disconnect_spellings() {
        let legacy = json!({"type": "OnClientDisconected", "body": {"id": "y", "ownerId": "z"}});
        let fixed = json!({"type": "OnClientDisconnected", "body": {"id": "y", "ownerId": "z"}});
        let expected = ServerMessage::OnClientDisconnected {
            id: "y".into(),
            owner_id: Some("z".into()),
        };
        assert_eq!(ServerMessage::from_json(&legacy.to_string()).unwrap(), expected);
        assert_eq!(ServerMessage::from_json(&fixed.to_string()).unwrap(), expected);
        assert!(expected.to_json().unwrap().contains("OnClientDisconected"));
    }

    #[test]
    fn test_key_event_aliases() {
        let raw = json!({"type": "OnClientEvent", "body": {"from": "a", "eventType": "keyDown", "data": {"key": " "}}});
        let msg = ServerMessage::from_json(&raw.to_string()).unwrap();
        assert!(matches!(
            msg,
            ServerMessage::OnClientEvent(RelayedEvent {
                event: ClientEvent::KeyDown { .. },
                ..
            })
        ));
    }

    #[test]
    fn test_empty_room_snapshot() {
        let raw = json!({"type": "GetCurrentState", "body": {"clients": []}});
        let msg = ServerMessage::from_json(&raw.to_string()).unwrap();
        assert_eq!(msg, ServerMessage::GetCurrentState(SessionSnapshot::default()));
    }

    #[test]
    fn test_malformed() {
        assert!(matches!(
            ServerMessage::from_json("{\"type\": \"Nope\"}"),
            Err(SyncError::MalformedMessage(_))
        ));
        assert!(matches!(
            ServerMessage::from_json("not json"),
            Err(SyncError::MalformedMessage(_))
        ));
    }
}
