//! Client session: the roster, canvas and viewport of one participant.
//!
//! All mutation happens in `Session` methods, called in delivery order by the
//! host. Incoming server messages go through [`Session::handle_message`];
//! local input goes through the pointer/key/tool methods, which apply the
//! change locally first and then queue the matching outgoing message.
//!
//! ## Joining
//!
//! After `OnSelfConnected` the session buffers every room message until the
//! owner's snapshot arrives as `GetCurrentState`. The snapshot reflects the
//! room up to the point where the server issued the state request, except for
//! the owner's own events, which the owner applies before they reach the
//! server. So on `GetCurrentState` buffered events from the snapshot source
//! are dropped and everything else is replayed in order. When the server
//! re-issues the request (the owner left first) it also sends the request to
//! the joiner, which restarts the buffer at that point.

use std::collections::VecDeque;
use std::sync::Arc;

use kurbo::{Point, Size, Vec2};

use crate::artist::{Artist, ArtistId, ArtistIdentity, ArtistState};
use crate::brush::BrushSettings;
use crate::canvas::Canvas;
use crate::config::SessionConfig;
use crate::error::{SyncError, SyncResult};
use crate::protocol::{
    ClientEvent, ClientMessage, PointerData, RelayedEvent, RelayedToolUpdate, ServerMessage,
    SessionSnapshot, SnapshotData, ToolUpdate,
};
use crate::roster::{ArtistRoster, RosterEvent};
use crate::stroke::CommittedStroke;
use crate::tools::ToolKind;
use crate::transport::Transport;
use crate::viewport::Viewport;

/// Key name used for the middle mouse button in key actions.
pub const MIDDLE_MOUSE_KEY: &str = "mousemiddle";

const PRIMARY_BUTTON: i16 = 0;
const MIDDLE_BUTTON: i16 = 1;

/// Wheel zoom factors per scroll step.
const WHEEL_ZOOM_IN: f64 = 1.1;
const WHEEL_ZOOM_OUT: f64 = 0.9;

/// Where the session is in the connect/join handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinState {
    /// No transport. Local drawing works but nothing is sent.
    Offline,
    /// Transport up, waiting for `OnSelfConnected`.
    AwaitingIdentity,
    /// Identity known, waiting for `GetCurrentState`.
    AwaitingSnapshot,
    Joined,
}

/// A pointer sample in screen space, as captured by the host.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerInput {
    pub position: Point,
    pub pressure: f64,
    /// Button that changed state (0 = primary, 1 = middle).
    pub button: i16,
    /// Bitmask of pressed buttons.
    pub buttons: u16,
    /// Host timestamp in milliseconds.
    pub t: f64,
}

impl PointerInput {
    /// A full-pressure primary button sample.
    pub fn primary(x: f64, y: f64) -> Self {
        Self {
            position: Point::new(x, y),
            pressure: 1.0,
            button: PRIMARY_BUTTON,
            buttons: 1,
            t: 0.0,
        }
    }

    pub fn with_pressure(mut self, pressure: f64) -> Self {
        self.pressure = pressure;
        self
    }

    pub fn with_button(mut self, button: i16) -> Self {
        self.button = button;
        self
    }
}

/// Notifications for the UI and renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Roster(RosterEvent),
    IdentityAssigned(ArtistIdentity),
    CursorMoved {
        artist_id: ArtistId,
        position: Point,
    },
    ToolChanged {
        artist_id: ArtistId,
        tool: ToolKind,
    },
    StrokeStarted {
        artist_id: ArtistId,
    },
    StrokeCommitted {
        artist_id: ArtistId,
        stroke: Arc<CommittedStroke>,
    },
    StrokeDiscarded {
        artist_id: ArtistId,
    },
    HistoryChanged {
        can_undo: bool,
        can_redo: bool,
    },
    /// A join snapshot was applied and buffered events replayed.
    StateApplied,
    /// The local artist clicked with the eyedropper at this canvas position.
    EyedropperRequested {
        position: Point,
    },
    ViewportChanged,
    ServerError(String),
}

/// An in-progress navigation drag, in screen space.
#[derive(Debug, Clone, Copy)]
struct Drag {
    anchor: Point,
    last: Point,
}

/// Synchronization state of one client.
#[derive(Debug)]
pub struct Session {
    config: SessionConfig,
    roster: ArtistRoster,
    canvas: Canvas,
    viewport: Viewport,
    screen_size: Size,
    join_state: JoinState,
    /// Room messages held back until the join snapshot arrives.
    buffered: VecDeque<ServerMessage>,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    events: Vec<SessionEvent>,
    drag: Option<Drag>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionConfig::default())
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let roster = ArtistRoster::new(
            config.default_brush.clone(),
            config.default_eraser.clone(),
        );
        let canvas = Canvas::new(config.canvas.clone(), config.history_depth);
        let screen_size = Size::new(config.canvas.width as f64, config.canvas.height as f64);
        Self {
            config,
            roster,
            canvas,
            viewport: Viewport::new(),
            screen_size,
            join_state: JoinState::Offline,
            buffered: VecDeque::new(),
            outgoing: Vec::new(),
            events: Vec::new(),
            drag: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn roster(&self) -> &ArtistRoster {
        &self.roster
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Set the size of the drawing surface, used as the rotation center.
    pub fn set_screen_size(&mut self, size: Size) {
        self.screen_size = size;
    }

    pub fn join_state(&self) -> JoinState {
        self.join_state
    }

    pub fn local_artist(&self) -> &Artist {
        self.roster.local()
    }

    /// Id assigned by the server; empty while offline.
    pub fn local_id(&self) -> &str {
        &self.roster.local().id
    }

    pub fn is_owner(&self) -> bool {
        self.roster.local().owner
    }

    /// Number of room messages waiting for the join snapshot.
    pub fn buffered_len(&self) -> usize {
        self.buffered.len()
    }

    // --- Transport lifecycle ---

    /// The transport connected; wait for the server to assign an identity.
    pub fn on_transport_connected(&mut self) {
        let local_id = self.local_id().to_string();
        if self.canvas.discard_artist(&local_id) {
            self.events.push(SessionEvent::StrokeDiscarded {
                artist_id: local_id,
            });
        }
        self.buffered.clear();
        self.join_state = JoinState::AwaitingIdentity;
        log::info!("Transport connected, awaiting identity");
    }

    /// The transport dropped: remote artists are gone and their live strokes
    /// are discarded. Unsent messages are dropped.
    pub fn on_transport_disconnected(&mut self) {
        for id in self.roster.clear_remote() {
            if self.canvas.discard_artist(&id) {
                self.events.push(SessionEvent::StrokeDiscarded { artist_id: id });
            }
        }
        self.roster.local_mut().owner = false;
        if !self.outgoing.is_empty() {
            log::debug!("Dropping {} unsent messages", self.outgoing.len());
            self.outgoing.clear();
        }
        self.buffered.clear();
        self.join_state = JoinState::Offline;
        self.drain_roster();
        log::info!("Transport disconnected");
    }

    // --- Incoming messages ---

    /// Parse and apply one server message.
    ///
    /// Malformed input is rejected with [`SyncError::MalformedMessage`] and
    /// leaves the session untouched. Other errors mean the message was
    /// dropped; roster and canvas invariants still hold.
    pub fn handle_message(&mut self, json: &str) -> SyncResult<()> {
        let message = match ServerMessage::from_json(json) {
            Ok(message) => message,
            Err(err) => {
                log::warn!("Dropping malformed message: {}", err);
                return Err(err);
            }
        };
        let result = self.dispatch(message);
        if let Err(err) = &result {
            log::debug!("Message dropped: {}", err);
        }
        self.drain_roster();
        result
    }

    fn dispatch(&mut self, message: ServerMessage) -> SyncResult<()> {
        if self.is_buffering() && is_room_message(&message) {
            self.buffer(message);
            return Ok(());
        }
        match message {
            ServerMessage::OnSelfConnected(identity) => {
                self.on_self_connected(identity);
                Ok(())
            }
            ServerMessage::OnClientConnected(identity) => {
                self.on_client_connected(identity);
                Ok(())
            }
            ServerMessage::OnClientDisconnected { id, owner_id } => {
                self.on_client_disconnected(&id, owner_id.as_deref());
                Ok(())
            }
            ServerMessage::GetCurrentState(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(())
            }
            ServerMessage::RequestCurrentState { requester } => {
                self.on_state_request(requester);
                Ok(())
            }
            ServerMessage::OnClientEvent(RelayedEvent { from, event }) => {
                if from == self.local_id() {
                    log::debug!("Ignoring echoed event");
                    return Ok(());
                }
                self.apply_client_event(&from, &event)
            }
            ServerMessage::OnClientToolUpdate(RelayedToolUpdate { from, update }) => {
                if from == self.local_id() {
                    log::debug!("Ignoring echoed tool update");
                    return Ok(());
                }
                self.apply_tool_update(&from, update)
            }
            ServerMessage::Error { message } => {
                log::warn!("Server error: {}", message);
                self.events.push(SessionEvent::ServerError(message));
                Ok(())
            }
        }
    }

    fn is_buffering(&self) -> bool {
        matches!(
            self.join_state,
            JoinState::AwaitingIdentity | JoinState::AwaitingSnapshot
        )
    }

    fn buffer(&mut self, message: ServerMessage) {
        if self.buffered.len() >= self.config.max_buffered_events {
            log::warn!(
                "Join buffer full ({} events), dropping oldest",
                self.buffered.len()
            );
            self.buffered.pop_front();
        }
        self.buffered.push_back(message);
    }

    fn on_self_connected(&mut self, identity: ArtistIdentity) {
        log::info!("Connected as {} ({})", identity.id, identity.name);
        let previous_id = self.local_id().to_string();
        if previous_id != identity.id && self.canvas.discard_artist(&previous_id) {
            self.events.push(SessionEvent::StrokeDiscarded {
                artist_id: previous_id,
            });
        }
        let owner = identity.owner;
        let id = identity.id.clone();
        self.roster.local_mut().set_identity(identity.clone());
        if owner {
            self.roster.change_owner(&id);
        }
        self.join_state = JoinState::AwaitingSnapshot;
        self.events.push(SessionEvent::IdentityAssigned(identity));
    }

    fn on_client_connected(&mut self, identity: ArtistIdentity) {
        if identity.id == self.local_id() {
            log::debug!("Ignoring own connect notification");
            return;
        }
        let artist = self.new_remote(identity);
        self.roster.add_remote_artist(artist);
    }

    fn on_client_disconnected(&mut self, id: &str, owner_id: Option<&str>) {
        if self.canvas.discard_artist(id) {
            self.events.push(SessionEvent::StrokeDiscarded {
                artist_id: id.to_string(),
            });
        }
        if self.roster.remove_remote_artist(id).is_none() {
            log::debug!("Disconnect of unknown artist {}", id);
        }
        if let Some(owner_id) = owner_id {
            self.roster.change_owner(owner_id);
        }
    }

    fn on_state_request(&mut self, requester: ArtistId) {
        if requester == self.local_id() {
            // Re-issued request: the snapshot will reflect the room from here.
            log::debug!(
                "State request re-issued, dropping {} buffered events",
                self.buffered.len()
            );
            self.buffered.clear();
            return;
        }
        if !self.is_owner() {
            log::debug!("Answering state request for {} without ownership", requester);
        }
        let data = self.snapshot_data();
        log::info!(
            "Sending state to {} ({} strokes)",
            requester,
            data.canvas.strokes.len()
        );
        self.send(ClientMessage::CurrentState { requester, data });
    }

    /// Current state of this client as handed to a joining artist.
    pub fn snapshot_data(&self) -> SnapshotData {
        let local = self.roster.local();
        let mut artists: Vec<ArtistState> = Vec::with_capacity(self.roster.len() + 1);
        if local.has_identity() {
            artists.push(local.state());
        }
        artists.extend(self.roster.serialize());
        SnapshotData {
            artists,
            canvas: self.canvas.snapshot(),
        }
    }

    fn apply_snapshot(&mut self, snapshot: SessionSnapshot) {
        let local_id = self.local_id().to_string();
        let SessionSnapshot {
            clients,
            data,
            source,
        } = snapshot;

        for identity in clients.into_iter().filter(|c| c.id != local_id) {
            let artist = self.new_remote(identity);
            self.roster.add_remote_artist(artist);
        }

        if let Some(data) = data {
            let records: Vec<ArtistState> = data
                .artists
                .into_iter()
                .filter(|r| r.id != local_id)
                .map(|mut r| {
                    r.brush_settings = r.brush_settings.sanitized(&self.config.default_brush);
                    r.eraser_settings = r.eraser_settings.sanitized(&self.config.default_eraser);
                    r
                })
                .collect();
            self.roster.deserialize(&records);
            self.canvas.restore(data.canvas);
        }

        let was_joined = self.join_state == JoinState::Joined;
        self.join_state = JoinState::Joined;
        self.events.push(SessionEvent::StateApplied);

        if was_joined {
            log::debug!("Snapshot applied while already joined");
        }
        let buffered = std::mem::take(&mut self.buffered);
        log::info!(
            "Joined with {} strokes, replaying {} buffered events",
            self.canvas.layer().len(),
            buffered.len()
        );
        for message in buffered {
            if source.is_some() && message.sender() == source.as_deref() {
                log::trace!("Skipping buffered event already in snapshot");
                continue;
            }
            if let Err(err) = self.dispatch(message) {
                log::debug!("Buffered event dropped: {}", err);
            }
        }
        self.push_history();
    }

    fn new_remote(&self, identity: ArtistIdentity) -> Artist {
        Artist::remote(
            identity,
            self.config.default_brush.clone(),
            self.config.default_eraser.clone(),
        )
    }

    // --- Event application, shared by local and remote artists ---

    fn apply_client_event(&mut self, artist_id: &str, event: &ClientEvent) -> SyncResult<()> {
        let artist = find_artist(&mut self.roster, artist_id)?;
        match event {
            ClientEvent::MouseDown(data) => {
                let position = checked_position(data)?;
                artist.cursor = Some(position);
                artist.tools.pointer_down();
                let tool = artist.tool();
                let erase = tool == ToolKind::Eraser;
                let brush = artist.stroke_settings(erase).clone();
                self.push_cursor(artist_id, position);
                if data.is_primary() && tool.paints() {
                    self.canvas.start_stroke(artist_id, &brush, erase);
                    self.events.push(SessionEvent::StrokeStarted {
                        artist_id: artist_id.to_string(),
                    });
                    self.canvas.update_stroke(artist_id, data.node())?;
                }
            }
            ClientEvent::MouseMove(data) => {
                let position = checked_position(data)?;
                artist.cursor = Some(position);
                self.push_cursor(artist_id, position);
                self.canvas.update_stroke(artist_id, data.node())?;
            }
            ClientEvent::MouseUp(data) => {
                let position = checked_position(data)?;
                artist.cursor = Some(position);
                self.push_cursor(artist_id, position);
                if data.is_primary() {
                    if let Some(stroke) = self.canvas.end_stroke(artist_id, Some(data.node()))? {
                        self.events.push(SessionEvent::StrokeCommitted {
                            artist_id: artist_id.to_string(),
                            stroke,
                        });
                        self.push_history();
                    }
                }
            }
            ClientEvent::KeyDown { key } => {
                if artist.tools.key_down(key) {
                    let tool = artist.tool();
                    self.push_tool(artist_id, tool);
                }
            }
            ClientEvent::KeyUp { key } => {
                if artist.tools.key_up(key) {
                    let tool = artist.tool();
                    self.push_tool(artist_id, tool);
                }
            }
        }
        Ok(())
    }

    fn apply_tool_update(&mut self, artist_id: &str, update: ToolUpdate) -> SyncResult<()> {
        let artist = find_artist(&mut self.roster, artist_id)?;
        match update {
            ToolUpdate::ToolTypeChange { tool_type } => {
                artist.tools.select_tool(tool_type);
                self.push_tool(artist_id, tool_type);
            }
            ToolUpdate::BrushSettingsChange { brush_settings } => {
                artist.brush_settings = brush_settings.sanitized(&self.config.default_brush);
            }
            ToolUpdate::EraserSettingsChange { eraser_settings } => {
                artist.eraser_settings = eraser_settings.sanitized(&self.config.default_eraser);
            }
            ToolUpdate::Undo => {
                if self.canvas.undo() {
                    log::debug!("Undo by {}", artist_id);
                    self.push_history();
                }
            }
            ToolUpdate::Redo => {
                if self.canvas.redo() {
                    log::debug!("Redo by {}", artist_id);
                    self.push_history();
                }
            }
        }
        Ok(())
    }

    // --- Local input ---

    /// Primary press starts a stroke (brush/eraser) or a navigation drag. A
    /// middle press acts as the `mousemiddle` key.
    pub fn pointer_down(&mut self, input: PointerInput) -> SyncResult<()> {
        if input.button == MIDDLE_BUTTON {
            return self.key_down(MIDDLE_MOUSE_KEY);
        }
        checked_screen_position(&input)?;
        let position = self.viewport.screen_to_canvas(input.position);
        if input.button == PRIMARY_BUTTON {
            self.drag = Some(Drag {
                anchor: input.position,
                last: input.position,
            });
        }
        self.apply_local_pointer(ClientEvent::MouseDown(pointer_data(&input, position)))
    }

    /// Pointer motion: drags the viewport with a navigation tool and extends
    /// the live stroke.
    pub fn pointer_move(&mut self, input: PointerInput) -> SyncResult<()> {
        checked_screen_position(&input)?;
        let tool = self.roster.local().tool();
        if let Some(drag) = self.drag.as_mut() {
            let delta: Vec2 = input.position - drag.last;
            drag.last = input.position;
            let anchor = drag.anchor;
            let moved = match tool {
                ToolKind::Pan => {
                    self.viewport.pan(delta);
                    true
                }
                ToolKind::Zoom => {
                    self.viewport.scrubby_zoom(anchor, delta.x);
                    true
                }
                ToolKind::Rotate => {
                    self.viewport.scrubby_rotate(anchor, delta.x);
                    true
                }
                _ => false,
            };
            if moved {
                self.events.push(SessionEvent::ViewportChanged);
            }
        }
        let position = self.viewport.screen_to_canvas(input.position);
        self.apply_local_pointer(ClientEvent::MouseMove(pointer_data(&input, position)))
    }

    /// Primary release ends the live stroke and any drag, and picks a color
    /// with the eyedropper.
    pub fn pointer_up(&mut self, input: PointerInput) -> SyncResult<()> {
        if input.button == MIDDLE_BUTTON {
            return self.key_up(MIDDLE_MOUSE_KEY);
        }
        checked_screen_position(&input)?;
        let position = self.viewport.screen_to_canvas(input.position);
        if input.button == PRIMARY_BUTTON {
            self.drag = None;
            if self.roster.local().tool() == ToolKind::Eyedropper {
                self.events
                    .push(SessionEvent::EyedropperRequested { position });
            }
        }
        self.apply_local_pointer(ClientEvent::MouseUp(pointer_data(&input, position)))
    }

    /// Scroll wheel zooms around the pointer. Positive `delta_y` zooms in.
    pub fn wheel(&mut self, position: Point, delta_y: f64) {
        if !position.is_finite() {
            log::debug!("Ignoring wheel at non-finite position");
            return;
        }
        let factor = if delta_y > 0.0 {
            WHEEL_ZOOM_IN
        } else {
            WHEEL_ZOOM_OUT
        };
        self.viewport.zoom_at(position, factor);
        self.events.push(SessionEvent::ViewportChanged);
    }

    pub fn key_down(&mut self, key: &str) -> SyncResult<()> {
        let key = key.to_lowercase();
        let center = Point::new(self.screen_size.width / 2.0, self.screen_size.height / 2.0);
        match key.as_str() {
            "arrowleft" => {
                self.viewport.rotate_left(center);
                self.events.push(SessionEvent::ViewportChanged);
            }
            "arrowright" => {
                self.viewport.rotate_right(center);
                self.events.push(SessionEvent::ViewportChanged);
            }
            _ => {}
        }
        self.apply_local(ClientEvent::KeyDown { key })
    }

    pub fn key_up(&mut self, key: &str) -> SyncResult<()> {
        self.apply_local(ClientEvent::KeyUp {
            key: key.to_lowercase(),
        })
    }

    /// Select a tool for the local artist.
    pub fn select_tool(&mut self, tool: ToolKind) {
        self.roster.local_mut().tools.select_tool(tool);
        let local_id = self.local_id().to_string();
        self.push_tool(&local_id, tool);
        self.send(ClientMessage::OnClientToolUpdate(
            ToolUpdate::ToolTypeChange { tool_type: tool },
        ));
    }

    pub fn set_brush_settings(&mut self, settings: BrushSettings) {
        let settings = settings.sanitized(&self.config.default_brush);
        self.roster.local_mut().brush_settings = settings.clone();
        self.send(ClientMessage::OnClientToolUpdate(
            ToolUpdate::BrushSettingsChange {
                brush_settings: settings,
            },
        ));
    }

    pub fn set_eraser_settings(&mut self, settings: BrushSettings) {
        let settings = settings.sanitized(&self.config.default_eraser);
        self.roster.local_mut().eraser_settings = settings.clone();
        self.send(ClientMessage::OnClientToolUpdate(
            ToolUpdate::EraserSettingsChange {
                eraser_settings: settings,
            },
        ));
    }

    /// Undo the last change to the shared layer. Returns false if there was
    /// nothing to undo or the session is still joining.
    pub fn undo(&mut self) -> bool {
        if !self.can_edit() || !self.canvas.undo() {
            return false;
        }
        self.push_history();
        self.send(ClientMessage::OnClientToolUpdate(ToolUpdate::Undo));
        true
    }

    /// Redo the last undone change. Returns false if there was nothing to
    /// redo or the session is still joining.
    pub fn redo(&mut self) -> bool {
        if !self.can_edit() || !self.canvas.redo() {
            return false;
        }
        self.push_history();
        self.send(ClientMessage::OnClientToolUpdate(ToolUpdate::Redo));
        true
    }

    /// Whether local edits to the shared layer are accepted. While joining
    /// they would be overwritten by the snapshot.
    pub fn can_edit(&self) -> bool {
        matches!(self.join_state, JoinState::Offline | JoinState::Joined)
    }

    fn apply_local_pointer(&mut self, event: ClientEvent) -> SyncResult<()> {
        if !self.can_edit() {
            log::trace!("Pointer input ignored while joining");
            return Ok(());
        }
        self.apply_local(event)
    }

    fn apply_local(&mut self, event: ClientEvent) -> SyncResult<()> {
        let local_id = self.local_id().to_string();
        self.apply_client_event(&local_id, &event)?;
        self.send(ClientMessage::OnClientEvent(event));
        Ok(())
    }

    // --- Outgoing ---

    fn send(&mut self, message: ClientMessage) {
        if self.join_state == JoinState::Offline {
            return;
        }
        match message.to_json() {
            Ok(json) => self.outgoing.push(json),
            Err(err) => log::warn!("Failed to serialize outgoing message: {}", err),
        }
    }

    /// Take pending outgoing messages, oldest first.
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Send pending messages in order. On failure the unsent messages stay
    /// queued and the error is returned.
    pub fn flush<T: Transport + ?Sized>(&mut self, transport: &mut T) -> SyncResult<usize> {
        let mut sent = 0;
        while sent < self.outgoing.len() {
            if let Err(err) = transport.send(&self.outgoing[sent]) {
                self.outgoing.drain(..sent);
                log::warn!("Transport send failed after {} messages: {}", sent, err);
                return Err(err);
            }
            sent += 1;
        }
        self.outgoing.clear();
        Ok(sent)
    }

    // --- Observer events ---

    /// Take queued observer notifications, oldest first.
    pub fn take_events(&mut self) -> Vec<SessionEvent> {
        self.drain_roster();
        std::mem::take(&mut self.events)
    }

    fn drain_roster(&mut self) {
        self.events
            .extend(self.roster.take_events().into_iter().map(SessionEvent::Roster));
    }

    fn push_cursor(&mut self, artist_id: &str, position: Point) {
        self.events.push(SessionEvent::CursorMoved {
            artist_id: artist_id.to_string(),
            position,
        });
    }

    fn push_tool(&mut self, artist_id: &str, tool: ToolKind) {
        self.events.push(SessionEvent::ToolChanged {
            artist_id: artist_id.to_string(),
            tool,
        });
    }

    fn push_history(&mut self) {
        self.events.push(SessionEvent::HistoryChanged {
            can_undo: self.canvas.layer().can_undo(),
            can_redo: self.canvas.layer().can_redo(),
        });
    }
}

/// Messages that describe room activity and must be ordered after the join
/// snapshot.
fn is_room_message(message: &ServerMessage) -> bool {
    matches!(
        message,
        ServerMessage::OnClientConnected(_)
            | ServerMessage::OnClientDisconnected { .. }
            | ServerMessage::OnClientEvent(_)
            | ServerMessage::OnClientToolUpdate(_)
    )
}

/// Look up the artist an event is attributed to. The local artist matches
/// its own id, including the empty id used while offline.
fn find_artist<'a>(roster: &'a mut ArtistRoster, artist_id: &str) -> SyncResult<&'a mut Artist> {
    if roster.local().id == artist_id {
        return Ok(roster.local_mut());
    }
    roster
        .get_mut(artist_id)
        .ok_or_else(|| SyncError::UnknownArtist(artist_id.to_string()))
}

fn checked_position(data: &PointerData) -> SyncResult<Point> {
    if data.x.is_finite() && data.y.is_finite() {
        Ok(Point::new(data.x, data.y))
    } else {
        Err(SyncError::InvalidSample {
            x: data.x,
            y: data.y,
        })
    }
}

/// Reject non-finite screen positions before they reach the viewport.
fn checked_screen_position(input: &PointerInput) -> SyncResult<()> {
    if input.position.is_finite() {
        Ok(())
    } else {
        Err(SyncError::InvalidSample {
            x: input.position.x,
            y: input.position.y,
        })
    }
}

fn pointer_data(input: &PointerInput, position: Point) -> PointerData {
    PointerData {
        x: position.x,
        y: position.y,
        pressure: input.pressure,
        button: input.button,
        buttons: input.buttons,
        t: input.t,
    }
}
