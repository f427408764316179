//! The set of artists in a session.
//!
//! Invariants kept after every call:
//! - a remote id appears at most once;
//! - at most one artist (local or remote) has `owner` set;
//! - every membership change queues a [`RosterEvent::Published`] snapshot.

use crate::artist::{Artist, ArtistId, ArtistState, ArtistView};
use crate::brush::BrushSettings;

/// Notifications for roster observers.
#[derive(Debug, Clone, PartialEq)]
pub enum RosterEvent {
    /// Fresh read-only copy of the remote artists, in roster order.
    Published(Vec<ArtistView>),
    /// An artist left or was replaced; release its cursor/overlay resources.
    Destroyed(ArtistView),
}

/// Tracks the local artist and the connected remote artists.
#[derive(Debug)]
pub struct ArtistRoster {
    local: Artist,
    remote: Vec<Artist>,
    events: Vec<RosterEvent>,
}

impl ArtistRoster {
    pub fn new(brush: BrushSettings, eraser: BrushSettings) -> Self {
        Self {
            local: Artist::local(brush, eraser),
            remote: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn local(&self) -> &Artist {
        &self.local
    }

    pub fn local_mut(&mut self) -> &mut Artist {
        &mut self.local
    }

    /// Remote artists in roster order.
    pub fn remote_artists(&self) -> &[Artist] {
        &self.remote
    }

    pub fn len(&self) -> usize {
        self.remote.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remote.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.remote.iter().any(|a| a.id == id)
    }

    /// Find an artist by id, local or remote.
    pub fn get(&self, id: &str) -> Option<&Artist> {
        if self.local.has_identity() && self.local.id == id {
            return Some(&self.local);
        }
        self.remote.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Artist> {
        if self.local.has_identity() && self.local.id == id {
            return Some(&mut self.local);
        }
        self.remote.iter_mut().find(|a| a.id == id)
    }

    /// The current owner, if any.
    pub fn owner(&self) -> Option<&Artist> {
        std::iter::once(&self.local)
            .chain(self.remote.iter())
            .find(|a| a.owner)
    }

    /// Insert a remote artist, replacing any entry with the same id.
    pub fn add_remote_artist(&mut self, artist: Artist) {
        self.evict(&artist.id);
        log::info!("Artist {} ({}) joined", artist.id, artist.name);
        let owner_id = artist.owner.then(|| artist.id.clone());
        self.remote.push(artist);
        if let Some(owner_id) = owner_id {
            self.clear_owners_except(&owner_id);
        }
        self.publish();
    }

    pub fn add_remote_artists(&mut self, artists: impl IntoIterator<Item = Artist>) {
        for artist in artists {
            self.add_remote_artist(artist);
        }
    }

    /// Remove a remote artist. Absent ids are ignored.
    pub fn remove_remote_artist(&mut self, id: &str) -> Option<Artist> {
        let removed = self.evict(id);
        if removed.is_some() {
            log::info!("Artist {} left", id);
            self.publish();
        }
        removed
    }

    /// Make `owner_id` the single owner.
    ///
    /// Every other flag is cleared so a misbehaving server cannot leave two
    /// owners behind. An id that matches nobody leaves the flags untouched.
    pub fn change_owner(&mut self, owner_id: &str) {
        let Some(artist) = self.get_mut(owner_id) else {
            log::debug!("Ownership change to unknown artist {}", owner_id);
            return;
        };
        artist.owner = true;
        self.clear_owners_except(owner_id);
        log::info!("Artist {} is now owner", owner_id);
        self.publish();
    }

    /// Tool state of every remote artist, in roster order.
    pub fn serialize(&self) -> Vec<ArtistState> {
        self.remote.iter().map(Artist::state).collect()
    }

    /// Patch artists from snapshot records. Records for unknown ids are dropped.
    pub fn deserialize(&mut self, records: &[ArtistState]) {
        for record in records {
            match self.get_mut(&record.id) {
                Some(artist) => artist.apply_state(record),
                None => log::debug!("Dropping state for unknown artist {}", record.id),
            }
        }
        self.publish();
    }

    /// Read-only copies of the remote artists.
    pub fn views(&self) -> Vec<ArtistView> {
        self.remote.iter().map(Artist::view).collect()
    }

    /// Remove every remote artist (transport lost).
    pub fn clear_remote(&mut self) -> Vec<ArtistId> {
        let removed: Vec<Artist> = std::mem::take(&mut self.remote);
        for artist in &removed {
            self.events.push(RosterEvent::Destroyed(artist.view()));
        }
        if !removed.is_empty() {
            self.publish();
        }
        removed.into_iter().map(|a| a.id).collect()
    }

    /// Take queued observer notifications.
    pub fn take_events(&mut self) -> Vec<RosterEvent> {
        std::mem::take(&mut self.events)
    }

    fn evict(&mut self, id: &str) -> Option<Artist> {
        let pos = self.remote.iter().position(|a| a.id == id)?;
        let artist = self.remote.remove(pos);
        self.events.push(RosterEvent::Destroyed(artist.view()));
        Some(artist)
    }

    fn clear_owners_except(&mut self, owner_id: &str) {
        if self.local.id != owner_id {
            self.local.owner = false;
        }
        for artist in self.remote.iter_mut().filter(|a| a.id != owner_id) {
            artist.owner = false;
        }
    }

    fn publish(&mut self) {
        self.events.push(RosterEvent::Published(self.views()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artist::ArtistIdentity;
    use crate::brush::Color;
    use crate::tools::ToolKind;

    fn roster() -> ArtistRoster {
        ArtistRoster::new(BrushSettings::default_brush(), BrushSettings::default_eraser())
    }

    fn remote(id: &str, owner: bool) -> Artist {
        Artist::remote(
            ArtistIdentity {
                id: id.into(),
                name: id.to_uppercase(),
                owner,
                color: Color::black(),
            },
            BrushSettings::default_brush(),
            BrushSettings::default_eraser(),
        )
    }

    fn owner_count(roster: &ArtistRoster) -> usize {
        std::iter::once(roster.local())
            .chain(roster.remote_artists())
            .filter(|a| a.owner)
            .count()
    }

    #[test]
    fn test_add_replaces_same_id() {
        let mut roster = roster();
        roster.add_remote_artist(remote("a", false));
        roster.take_events();

        let mut again = remote("a", false);
        again.name = "renamed".into();
        roster.add_remote_artist(again);

        assert_eq!(roster.len(), 1);
        assert_eq!(roster.get("a").unwrap().name, "renamed");

        let events = roster.take_events();
        assert!(matches!(&events[0], RosterEvent::Destroyed(v) if v.identity.name == "A"));
        assert!(matches!(&events[1], RosterEvent::Published(v) if v.len() == 1));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut roster = roster();
        assert!(roster.remove_remote_artist("ghost").is_none());
        assert!(roster.take_events().is_empty());
    }

    #[test]
    fn test_remove_publishes() {
        let mut roster = roster();
        roster.add_remote_artists(vec![remote("a", false), remote("b", false)]);
        roster.take_events();

        assert!(roster.remove_remote_artist("a").is_some());
        let events = roster.take_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[1], RosterEvent::Published(v) if v.len() == 1));
    }

    #[test]
    fn test_change_owner_keeps_single_owner() {
        let mut roster = roster();
        roster.local_mut().set_identity(ArtistIdentity {
            id: "me".into(),
            name: "Me".into(),
            owner: true,
            color: Color::white(),
        });
        roster.add_remote_artists(vec![remote("a", false), remote("b", false)]);

        roster.change_owner("b");
        assert!(roster.get("b").unwrap().owner);
        assert!(!roster.local().owner);
        assert_eq!(owner_count(&roster), 1);

        roster.change_owner("me");
        assert!(roster.local().owner);
        assert_eq!(owner_count(&roster), 1);

        roster.change_owner("nobody");
        assert!(roster.local().owner);
        assert_eq!(owner_count(&roster), 1);
    }

    #[test]
    fn test_joining_owner_clears_previous_owner() {
        let mut roster = roster();
        roster.add_remote_artist(remote("a", true));
        roster.add_remote_artist(remote("b", true));
        assert_eq!(owner_count(&roster), 1);
        assert_eq!(roster.owner().unwrap().id, "b");
    }

    #[test]
    fn test_owner_handover_after_disconnect() {
        let mut roster = roster();
        roster.add_remote_artists(vec![remote("y", true), remote("z", false)]);

        roster.remove_remote_artist("y");
        roster.change_owner("z");

        assert!(!roster.contains("y"));
        assert!(roster.get("z").unwrap().owner);
        assert_eq!(owner_count(&roster), 1);
    }

    #[test]
    fn test_serialize_deserialize_roundtrip() {
        let mut source = roster();
        source.add_remote_artists(vec![remote("a", false), remote("b", false)]);
        {
            let a = source.get_mut("a").unwrap();
            a.brush_settings.size = 33.0;
            a.eraser_settings.opacity = 0.25;
            a.tools.select_tool(ToolKind::Eraser);
        }
        source.get_mut("b").unwrap().tools.select_tool(ToolKind::Rotate);
        let records = source.serialize();
        assert_eq!(records[0].id, "a");
        assert_eq!(records[1].id, "b");

        let mut target = roster();
        target.add_remote_artists(vec![remote("a", false), remote("b", false)]);
        target.deserialize(&records);
        assert_eq!(target.serialize(), records);
    }

    #[test]
    fn test_deserialize_drops_unknown_records() {
        let mut source = roster();
        source.add_remote_artist(remote("a", false));
        let records = source.serialize();

        let mut target = roster();
        target.deserialize(&records);
        assert!(target.is_empty());
    }

    #[test]
    fn test_clear_remote() {
        let mut roster = roster();
        roster.add_remote_artists(vec![remote("a", false), remote("b", false)]);
        roster.take_events();

        let removed = roster.clear_remote();
        assert_eq!(removed, vec!["a".to_string(), "b".to_string()]);
        assert!(roster.is_empty());
        let destroyed = roster
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, RosterEvent::Destroyed(_)))
            .count();
        assert_eq!(destroyed, 2);
    }
}
