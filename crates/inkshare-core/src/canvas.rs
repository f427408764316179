//! Canvas synchronization core: live strokes per artist plus the shared layer.
//!
//! Each artist has at most one live stroke entry. The entry stays after the
//! stroke ends (inactive) so late updates for that artist are inert, and is
//! overwritten by the artist's next start.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::artist::ArtistId;
use crate::brush::BrushSettings;
use crate::config::CanvasSettings;
use crate::error::SyncResult;
use crate::layer::Layer;
use crate::stroke::{CommittedStroke, Stroke, StrokeEngine, StrokeHandle, StrokeNode};

/// Per-artist live stroke entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveStroke {
    pub handle: StrokeHandle,
    /// False once the stroke has ended.
    pub is_active: bool,
    pub erase: bool,
}

/// Serialized layer plus history, as carried in join snapshots.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    pub strokes: Vec<CommittedStroke>,
    #[serde(default)]
    pub undo_depth: usize,
    #[serde(default)]
    pub redo_strokes: Vec<CommittedStroke>,
    /// Strokes still building when the snapshot was taken.
    #[serde(default)]
    pub live_strokes: Vec<CommittedStroke>,
}

/// The shared canvas of one client.
#[derive(Debug)]
pub struct Canvas {
    pub settings: CanvasSettings,
    engine: StrokeEngine,
    live: HashMap<ArtistId, LiveStroke>,
    layer: Layer,
}

impl Default for Canvas {
    fn default() -> Self {
        Self::new(CanvasSettings::default(), crate::config::DEFAULT_HISTORY_DEPTH)
    }
}

impl Canvas {
    pub fn new(settings: CanvasSettings, history_depth: usize) -> Self {
        Self {
            settings,
            engine: StrokeEngine::new(),
            live: HashMap::new(),
            layer: Layer::new(history_depth),
        }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    /// Live entry for an artist, active or not.
    pub fn live_entry(&self, artist_id: &str) -> Option<&LiveStroke> {
        self.live.get(artist_id)
    }

    /// Building strokes for live preview, keyed by artist.
    pub fn live_strokes(&self) -> impl Iterator<Item = (&str, &Stroke)> {
        self.live
            .iter()
            .filter(|(_, entry)| entry.is_active)
            .filter_map(|(id, entry)| {
                self.engine
                    .stroke(entry.handle)
                    .map(|stroke| (id.as_str(), stroke))
            })
    }

    /// Open a stroke for `artist_id`.
    ///
    /// A stroke still building for the same artist is discarded and replaced.
    pub fn start_stroke(
        &mut self,
        artist_id: &str,
        brush: &BrushSettings,
        erase: bool,
    ) -> StrokeHandle {
        self.release(artist_id);
        let handle = self.engine.start_stroke(artist_id, brush, erase);
        self.track(artist_id, handle, erase);
        handle
    }

    /// Add a node to the artist's live stroke.
    ///
    /// Returns `Ok(false)` when there is no active stroke or the node was
    /// skipped by the sampling policy.
    pub fn update_stroke(&mut self, artist_id: &str, node: StrokeNode) -> SyncResult<bool> {
        match self.active_handle(artist_id) {
            Some(handle) => self.engine.add_node(handle, node),
            None => Ok(false),
        }
    }

    /// End the artist's live stroke and commit it to the layer.
    ///
    /// `final_node` is appended first if given. Returns the committed stroke,
    /// or `None` when there was no active stroke or it had no nodes.
    pub fn end_stroke(
        &mut self,
        artist_id: &str,
        final_node: Option<StrokeNode>,
    ) -> SyncResult<Option<Arc<CommittedStroke>>> {
        let Some(handle) = self.active_handle(artist_id) else {
            return Ok(None);
        };
        if let Some(node) = final_node {
            if let Err(err) = self.engine.add_final_node(handle, node) {
                log::debug!("Final node of {} dropped: {}", artist_id, err);
            }
        }
        let committed = self.engine.end_stroke(handle)?;
        if let Some(entry) = self.live.get_mut(artist_id) {
            entry.is_active = false;
        }
        if committed.is_empty() {
            log::debug!("Empty stroke {} of {} not committed", handle, artist_id);
            return Ok(None);
        }
        Ok(Some(self.layer.commit(committed)))
    }

    /// Discard the artist's building stroke and drop its entry.
    /// Returns true if a building stroke was discarded.
    pub fn discard_artist(&mut self, artist_id: &str) -> bool {
        let Some(entry) = self.live.remove(artist_id) else {
            return false;
        };
        self.engine.discard(entry.handle);
        self.engine.forget(entry.handle);
        entry.is_active
    }

    pub fn undo(&mut self) -> bool {
        self.layer.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.layer.redo()
    }

    pub fn snapshot(&self) -> CanvasSnapshot {
        let mut live_strokes: Vec<CommittedStroke> =
            self.live_strokes().map(|(_, stroke)| stroke.to_value()).collect();
        live_strokes.sort_by(|a, b| a.artist_id.cmp(&b.artist_id));
        CanvasSnapshot {
            strokes: self.layer.strokes().cloned().collect(),
            undo_depth: self.layer.undo_depth(),
            redo_strokes: self.layer.redo_strokes(),
            live_strokes,
        }
    }

    /// Replace the layer and history, and resume the snapshot's building
    /// strokes. A resumed stroke replaces the artist's current live entry.
    pub fn restore(&mut self, snapshot: CanvasSnapshot) {
        log::debug!(
            "Restoring canvas with {} strokes, undo depth {}, {} live",
            snapshot.strokes.len(),
            snapshot.undo_depth,
            snapshot.live_strokes.len()
        );
        self.layer
            .restore(snapshot.strokes, snapshot.undo_depth, snapshot.redo_strokes);
        for stroke in snapshot.live_strokes {
            let artist_id = stroke.artist_id.clone();
            let erase = stroke.erase;
            self.release(&artist_id);
            let handle = self.engine.resume_stroke(stroke);
            self.track(&artist_id, handle, erase);
        }
    }

    /// Drop the artist's entry, discarding a stroke that is still building.
    fn release(&mut self, artist_id: &str) {
        if let Some(previous) = self.live.remove(artist_id) {
            if previous.is_active {
                log::debug!(
                    "Stroke {} of {} replaced before it ended",
                    previous.handle,
                    artist_id
                );
                self.engine.discard(previous.handle);
            }
            self.engine.forget(previous.handle);
        }
    }

    fn track(&mut self, artist_id: &str, handle: StrokeHandle, erase: bool) {
        self.live.insert(
            artist_id.to_string(),
            LiveStroke {
                handle,
                is_active: true,
                erase,
            },
        );
    }

    fn active_handle(&self, artist_id: &str) -> Option<StrokeHandle> {
        self.live
            .get(artist_id)
            .filter(|entry| entry.is_active)
            .map(|entry| entry.handle)
    }
}
