//! Stroke engine: turns pointer samples into committed paint strokes.
//!
//! A stroke is `Building` while an artist's pointer is down, then either
//! `Committed` (frozen into a [`CommittedStroke`] for the layer) or
//! `Discarded`. The sampling policy is a pure function of the input, so
//! replaying the same samples yields identical nodes on every peer.

use kurbo::{BezPath, Point, Rect};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::artist::ArtistId;
use crate::brush::BrushSettings;
use crate::error::{SyncError, SyncResult};

/// One pressure-sampled point of a stroke, in canvas space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrokeNode {
    pub x: f64,
    pub y: f64,
    /// Pen pressure in `[0, 1]`.
    pub pressure: f64,
    /// Sender timestamp in milliseconds.
    pub t: f64,
}

impl StrokeNode {
    pub fn point(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Opaque handle to a stroke owned by a [`StrokeEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrokeHandle(u64);

impl fmt::Display for StrokeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle phase of a stroke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrokePhase {
    Building,
    Committed,
    Discarded,
    /// The handle was never issued or has been forgotten.
    Unknown,
}

impl fmt::Display for StrokePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StrokePhase::Building => "building",
            StrokePhase::Committed => "committed",
            StrokePhase::Discarded => "discarded",
            StrokePhase::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// An in-progress stroke.
#[derive(Debug, Clone)]
pub struct Stroke {
    artist_id: ArtistId,
    erase: bool,
    brush: BrushSettings,
    nodes: Vec<StrokeNode>,
}

impl Stroke {
    fn new(artist_id: ArtistId, brush: BrushSettings, erase: bool) -> Self {
        Self {
            artist_id,
            erase,
            brush,
            nodes: Vec::new(),
        }
    }

    pub fn artist_id(&self) -> &str {
        &self.artist_id
    }

    pub fn is_erase(&self) -> bool {
        self.erase
    }

    /// Brush parameters captured at start.
    pub fn brush(&self) -> &BrushSettings {
        &self.brush
    }

    pub fn nodes(&self) -> &[StrokeNode] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Append a node unless it is closer than the brush spacing to the last
    /// kept node. Returns whether the node was kept.
    fn push_sampled(&mut self, node: StrokeNode, force: bool) -> bool {
        if let Some(last) = self.nodes.last() {
            let dist = last.point().distance(node.point());
            let too_close = dist < self.brush.node_spacing();
            if too_close && !(force && dist > 0.0) {
                return false;
            }
        }
        self.nodes.push(node);
        true
    }

    fn freeze(self) -> CommittedStroke {
        CommittedStroke {
            artist_id: self.artist_id,
            erase: self.erase,
            brush: self.brush,
            nodes: self.nodes,
        }
    }

    /// Copy of the stroke as it stands, for snapshots.
    pub fn to_value(&self) -> CommittedStroke {
        self.clone().freeze()
    }
}

/// A finished stroke, ready to be absorbed by a layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedStroke {
    pub artist_id: ArtistId,
    #[serde(default)]
    pub erase: bool,
    pub brush: BrushSettings,
    pub nodes: Vec<StrokeNode>,
}

impl CommittedStroke {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Bounding box of the nodes, inflated by half the brush size.
    pub fn bounds(&self) -> Rect {
        node_bounds(&self.nodes, self.brush.size / 2.0)
    }

    /// Polyline through the nodes for the renderer.
    pub fn to_path(&self) -> BezPath {
        node_path(&self.nodes)
    }
}

fn node_bounds(nodes: &[StrokeNode], radius: f64) -> Rect {
    let Some(first) = nodes.first() else {
        return Rect::ZERO;
    };
    nodes
        .iter()
        .skip(1)
        .fold(Rect::from_points(first.point(), first.point()), |rect, node| {
            rect.union_pt(node.point())
        })
        .inflate(radius, radius)
}

fn node_path(nodes: &[StrokeNode]) -> BezPath {
    let mut path = BezPath::new();
    let mut iter = nodes.iter();
    if let Some(first) = iter.next() {
        path.move_to(first.point());
        for node in iter {
            path.line_to(node.point());
        }
    }
    path
}

/// Owns every stroke handle issued to the canvas.
#[derive(Debug, Default)]
pub struct StrokeEngine {
    next_handle: u64,
    strokes: HashMap<StrokeHandle, StrokeSlot>,
}

#[derive(Debug)]
enum StrokeSlot {
    Building(Stroke),
    Committed,
    Discarded,
}

impl StrokeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a building stroke with a snapshot of `brush`.
    pub fn start_stroke(
        &mut self,
        artist_id: &str,
        brush: &BrushSettings,
        erase: bool,
    ) -> StrokeHandle {
        self.next_handle += 1;
        let handle = StrokeHandle(self.next_handle);
        self.strokes.insert(
            handle,
            StrokeSlot::Building(Stroke::new(artist_id.to_string(), brush.clone(), erase)),
        );
        log::trace!("Stroke {} started for {}", handle, artist_id);
        handle
    }

    /// Reopen a building stroke from nodes a peer has already sampled.
    ///
    /// Nodes are taken as they are; samples with non-finite coordinates are
    /// dropped.
    pub fn resume_stroke(&mut self, stroke: CommittedStroke) -> StrokeHandle {
        let handle = self.start_stroke(&stroke.artist_id, &stroke.brush, stroke.erase);
        if let Some(StrokeSlot::Building(building)) = self.strokes.get_mut(&handle) {
            building.nodes = stroke
                .nodes
                .into_iter()
                .filter_map(|node| validate(node).ok())
                .collect();
        }
        handle
    }

    /// Append a node to a building stroke.
    ///
    /// Returns `Ok(false)` when the sampling policy skipped the node.
    pub fn add_node(&mut self, handle: StrokeHandle, node: StrokeNode) -> SyncResult<bool> {
        let node = validate(node)?;
        let stroke = self.building_mut(handle)?;
        Ok(stroke.push_sampled(node, false))
    }

    /// Append the final node of a gesture. Unlike [`add_node`](Self::add_node)
    /// the node is kept whenever it moved at all, so the stroke ends exactly
    /// where the pointer was released.
    pub fn add_final_node(&mut self, handle: StrokeHandle, node: StrokeNode) -> SyncResult<bool> {
        let node = validate(node)?;
        let stroke = self.building_mut(handle)?;
        Ok(stroke.push_sampled(node, true))
    }

    /// Freeze a building stroke.
    pub fn end_stroke(&mut self, handle: StrokeHandle) -> SyncResult<CommittedStroke> {
        match self.strokes.get(&handle) {
            Some(StrokeSlot::Building(_)) => {}
            _ => return Err(self.invalid(handle)),
        }
        match self.strokes.insert(handle, StrokeSlot::Committed) {
            Some(StrokeSlot::Building(stroke)) => {
                log::trace!("Stroke {} committed with {} nodes", handle, stroke.len());
                Ok(stroke.freeze())
            }
            _ => Err(self.invalid(handle)),
        }
    }

    /// Abandon a stroke. Discarding a finished or unknown handle is a no-op.
    pub fn discard(&mut self, handle: StrokeHandle) {
        if let Some(slot) = self.strokes.get_mut(&handle) {
            if matches!(slot, StrokeSlot::Building(_)) {
                *slot = StrokeSlot::Discarded;
                log::trace!("Stroke {} discarded", handle);
            }
        }
    }

    /// Drop all bookkeeping for a handle.
    pub fn forget(&mut self, handle: StrokeHandle) {
        self.strokes.remove(&handle);
    }

    /// Read access to a building stroke (live preview).
    pub fn stroke(&self, handle: StrokeHandle) -> Option<&Stroke> {
        match self.strokes.get(&handle) {
            Some(StrokeSlot::Building(stroke)) => Some(stroke),
            _ => None,
        }
    }

    pub fn phase(&self, handle: StrokeHandle) -> StrokePhase {
        match self.strokes.get(&handle) {
            Some(StrokeSlot::Building(_)) => StrokePhase::Building,
            Some(StrokeSlot::Committed) => StrokePhase::Committed,
            Some(StrokeSlot::Discarded) => StrokePhase::Discarded,
            None => StrokePhase::Unknown,
        }
    }

    /// Number of handles still tracked.
    pub fn tracked(&self) -> usize {
        self.strokes.len()
    }

    fn building_mut(&mut self, handle: StrokeHandle) -> SyncResult<&mut Stroke> {
        let phase = self.phase(handle);
        match self.strokes.get_mut(&handle) {
            Some(StrokeSlot::Building(stroke)) => Ok(stroke),
            _ => Err(SyncError::InvalidStrokeState {
                handle,
                state: phase,
            }),
        }
    }

    fn invalid(&self, handle: StrokeHandle) -> SyncError {
        SyncError::InvalidStrokeState {
            handle,
            state: self.phase(handle),
        }
    }
}

fn validate(node: StrokeNode) -> SyncResult<StrokeNode> {
    if !(node.x.is_finite() && node.y.is_finite()) {
        return Err(SyncError::InvalidSample {
            x: node.x,
            y: node.y,
        });
    }
    let pressure = if node.pressure.is_finite() {
        node.pressure.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let t = if node.t.is_finite() { node.t } else { 0.0 };
    Ok(StrokeNode { pressure, t, ..node })
}
