//! Room membership and message routing, independent of sockets.
//!
//! Every call returns the messages it produces as [`Envelope`]s. The caller
//! pushes them through the room's broadcast channel in order, while still
//! holding the room, so every member observes one order of events.

use inkshare_core::protocol::{RelayedEvent, RelayedToolUpdate};
use inkshare_core::{ArtistId, ArtistIdentity, ClientMessage, Color, ServerMessage, SessionSnapshot};
use tracing::{debug, info, warn};

/// Colors handed out to artists in join order.
const PALETTE: [Color; 8] = [
    Color::rgb(0xE5, 0x39, 0x35),
    Color::rgb(0x1E, 0x88, 0xE5),
    Color::rgb(0x43, 0xA0, 0x47),
    Color::rgb(0xFB, 0x8C, 0x00),
    Color::rgb(0x8E, 0x24, 0xAA),
    Color::rgb(0x00, 0xAC, 0xC1),
    Color::rgb(0xD8, 0x1B, 0x60),
    Color::rgb(0x6D, 0x4C, 0x41),
];

/// Which connections a routed message is delivered to.
#[derive(Debug, Clone, PartialEq)]
pub enum Audience {
    Everyone,
    AllExcept(ArtistId),
    Only(Vec<ArtistId>),
}

impl Audience {
    pub fn includes(&self, id: &str) -> bool {
        match self {
            Audience::Everyone => true,
            Audience::AllExcept(excluded) => excluded != id,
            Audience::Only(ids) => ids.iter().any(|i| i == id),
        }
    }
}

/// A server message together with its audience.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub audience: Audience,
    pub message: ServerMessage,
}

impl Envelope {
    fn to(ids: &[&str], message: ServerMessage) -> Self {
        Self {
            audience: Audience::Only(ids.iter().map(|id| id.to_string()).collect()),
            message,
        }
    }

    fn all_except(id: &str, message: ServerMessage) -> Self {
        Self {
            audience: Audience::AllExcept(id.to_string()),
            message,
        }
    }
}

/// A joiner waiting for the owner's state.
#[derive(Debug, Clone)]
struct PendingRequest {
    requester: ArtistId,
    owner: ArtistId,
    /// Members other than the requester when the request was issued.
    clients: Vec<ArtistIdentity>,
}

/// Members of one room, in join order, and outstanding state requests.
#[derive(Debug, Default)]
pub struct RoomState {
    members: Vec<ArtistIdentity>,
    pending: Vec<PendingRequest>,
    joined_total: usize,
}

impl RoomState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn members(&self) -> &[ArtistIdentity] {
        &self.members
    }

    pub fn owner(&self) -> Option<&ArtistIdentity> {
        self.members.iter().find(|m| m.owner)
    }

    pub fn pending_requests(&self) -> usize {
        self.pending.len()
    }

    /// Add an artist. The first member becomes owner; later joiners get the
    /// owner's state through a state request.
    pub fn join(&mut self, id: ArtistId) -> (ArtistIdentity, Vec<Envelope>) {
        self.joined_total += 1;
        let identity = ArtistIdentity {
            id: id.clone(),
            name: format!("Artist {}", self.joined_total),
            owner: self.members.is_empty(),
            color: PALETTE[(self.joined_total - 1) % PALETTE.len()],
        };
        let owner = self.owner().map(|o| o.id.clone());
        self.members.push(identity.clone());

        let mut out = vec![
            Envelope::to(&[id.as_str()], ServerMessage::OnSelfConnected(identity.clone())),
            Envelope::all_except(&id, ServerMessage::OnClientConnected(identity.clone())),
        ];
        match owner {
            None => {
                info!("{} opened the room as owner", id);
                out.push(Envelope::to(
                    &[id.as_str()],
                    ServerMessage::GetCurrentState(SessionSnapshot::default()),
                ));
            }
            Some(owner) => {
                debug!("Requesting state for {} from {}", id, owner);
                out.push(self.request_state(&id, &owner));
            }
        }
        (identity, out)
    }

    /// Route a message from a member.
    pub fn route(&mut self, from: &str, message: ClientMessage) -> Vec<Envelope> {
        match message {
            ClientMessage::OnClientEvent(event) => vec![Envelope::all_except(
                from,
                ServerMessage::OnClientEvent(RelayedEvent {
                    from: from.to_string(),
                    event,
                }),
            )],
            ClientMessage::OnClientToolUpdate(update) => vec![Envelope::all_except(
                from,
                ServerMessage::OnClientToolUpdate(RelayedToolUpdate {
                    from: from.to_string(),
                    update,
                }),
            )],
            ClientMessage::CurrentState { requester, data } => {
                let Some(pos) = self
                    .pending
                    .iter()
                    .position(|p| p.requester == requester && p.owner == from)
                else {
                    debug!("Dropping stale state for {} from {}", requester, from);
                    return Vec::new();
                };
                let pending = self.pending.remove(pos);
                info!("Forwarding state from {} to {}", from, requester);
                vec![Envelope::to(
                    &[requester.as_str()],
                    ServerMessage::GetCurrentState(SessionSnapshot {
                        clients: pending.clients,
                        data: Some(data),
                        source: Some(from.to_string()),
                    }),
                )]
            }
        }
    }

    /// Remove an artist, hand ownership to the longest-connected member and
    /// re-issue state requests the leaver could no longer answer.
    pub fn leave(&mut self, id: &str) -> Vec<Envelope> {
        let Some(pos) = self.members.iter().position(|m| m.id == id) else {
            return Vec::new();
        };
        let left = self.members.remove(pos);
        self.pending.retain(|p| p.requester != id);

        if left.owner {
            if let Some(next) = self.members.first_mut() {
                next.owner = true;
                info!("Ownership passed from {} to {}", id, next.id);
            }
        }
        let owner = self.owner().map(|o| o.id.clone());

        let mut out = vec![Envelope {
            audience: Audience::Everyone,
            message: ServerMessage::OnClientDisconnected {
                id: id.to_string(),
                owner_id: owner.clone(),
            },
        }];

        let Some(owner) = owner else {
            return out;
        };
        let orphaned: Vec<ArtistId> = self
            .pending
            .iter()
            .filter(|p| p.owner == id)
            .map(|p| p.requester.clone())
            .collect();
        self.pending.retain(|p| p.owner != id);
        for requester in orphaned {
            if requester == owner {
                // nobody left holds the state
                warn!("State for {} was lost with {}", requester, id);
                out.push(Envelope::to(
                    &[requester.as_str()],
                    ServerMessage::GetCurrentState(SessionSnapshot {
                        clients: self.others(&requester),
                        data: None,
                        source: None,
                    }),
                ));
            } else {
                debug!("Re-issuing state request for {} to {}", requester, owner);
                out.push(self.request_state(&requester, &owner));
            }
        }
        out
    }

    /// Record a pending request and address it to the owner and the
    /// requester. The requester treats its copy as a buffer reset.
    fn request_state(&mut self, requester: &str, owner: &str) -> Envelope {
        self.pending.push(PendingRequest {
            requester: requester.to_string(),
            owner: owner.to_string(),
            clients: self.others(requester),
        });
        Envelope::to(
            &[owner, requester],
            ServerMessage::RequestCurrentState {
                requester: requester.to_string(),
            },
        )
    }

    fn others(&self, id: &str) -> Vec<ArtistIdentity> {
        self.members.iter().filter(|m| m.id != id).cloned().collect()
    }
}
