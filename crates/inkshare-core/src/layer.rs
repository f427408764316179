//! The shared paint layer and its undo/redo history.
//!
//! Strokes are only ever appended, so every state on the undo stack is a
//! prefix of the current stroke sequence and every state on the redo stack
//! extends it. [`Layer::restore`] relies on this to rebuild an identical
//! history from `(strokes, undo_depth, redo_strokes)`.

use std::sync::Arc;

use crate::config::DEFAULT_HISTORY_DEPTH;
use crate::stroke::CommittedStroke;

/// One state of the layer. Strokes are shared between states.
type LayerState = Vec<Arc<CommittedStroke>>;

/// Ordered committed strokes plus bounded undo/redo stacks.
#[derive(Debug, Clone)]
pub struct Layer {
    strokes: LayerState,
    undo_stack: Vec<LayerState>,
    redo_stack: Vec<LayerState>,
    history_depth: usize,
}

impl Default for Layer {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_DEPTH)
    }
}

impl Layer {
    pub fn new(history_depth: usize) -> Self {
        Self {
            strokes: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            history_depth,
        }
    }

    /// Committed strokes, oldest first.
    pub fn strokes(&self) -> impl Iterator<Item = &CommittedStroke> {
        self.strokes.iter().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.strokes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strokes.is_empty()
    }

    pub fn history_depth(&self) -> usize {
        self.history_depth
    }

    /// Absorb a committed stroke. Pushes an undo state and clears redo.
    pub fn commit(&mut self, stroke: CommittedStroke) -> Arc<CommittedStroke> {
        self.push_undo();
        let stroke = Arc::new(stroke);
        self.strokes.push(Arc::clone(&stroke));
        stroke
    }

    /// Revert the last change. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(previous) = self.undo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.strokes, previous);
        self.redo_stack.push(current);
        true
    }

    /// Reapply the last undone change. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> bool {
        let Some(next) = self.redo_stack.pop() else {
            return false;
        };
        let current = std::mem::replace(&mut self.strokes, next);
        self.undo_stack.push(current);
        self.trim_undo();
        true
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Strokes that a full sequence of redos would re-add, in order.
    pub fn redo_strokes(&self) -> Vec<CommittedStroke> {
        self.redo_stack
            .first()
            .map(|furthest| {
                furthest
                    .iter()
                    .skip(self.strokes.len())
                    .map(|s| (**s).clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Replace the layer and its history.
    ///
    /// `undo_depth` is clamped to the number of strokes and to the history
    /// depth.
    pub fn restore(
        &mut self,
        strokes: Vec<CommittedStroke>,
        undo_depth: usize,
        redo_strokes: Vec<CommittedStroke>,
    ) {
        self.strokes = strokes.into_iter().map(Arc::new).collect();
        let redo: Vec<Arc<CommittedStroke>> = redo_strokes.into_iter().map(Arc::new).collect();

        let len = self.strokes.len();
        let depth = undo_depth.min(len).min(self.history_depth);
        self.undo_stack = (len - depth..len)
            .map(|end| self.strokes[..end].to_vec())
            .collect();

        let redo_len = redo.len().min(self.history_depth);
        self.redo_stack = (1..=redo_len)
            .rev()
            .map(|n| {
                let mut state = self.strokes.clone();
                state.extend(redo[..n].iter().cloned());
                state
            })
            .collect();
    }

    fn push_undo(&mut self) {
        self.undo_stack.push(self.strokes.clone());
        self.redo_stack.clear();
        self.trim_undo();
    }

    fn trim_undo(&mut self) {
        if self.undo_stack.len() > self.history_depth {
            let excess = self.undo_stack.len() - self.history_depth;
            self.undo_stack.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::brush::BrushSettings;
    use crate::stroke::StrokeNode;

    fn stroke(x: f64) -> CommittedStroke {
        CommittedStroke {
            artist_id: "a".into(),
            erase: false,
            brush: BrushSettings::default_brush(),
            nodes: vec![StrokeNode {
                x,
                y: 0.0,
                pressure: 1.0,
                t: 0.0,
            }],
        }
    }

    fn xs(layer: &Layer) -> Vec<f64> {
        layer.strokes().map(|s| s.nodes[0].x).collect()
    }

    #[test]
    fn test_undo_on_empty_is_noop() {
        let mut layer = Layer::default();
        assert!(!layer.undo());
        assert!(!layer.redo());
        assert!(layer.is_empty());
    }

    #[test]
    fn test_undo_redo() {
        let mut layer = Layer::default();
        layer.commit(stroke(1.0));
        layer.commit(stroke(2.0));

        assert!(layer.undo());
        assert_eq!(xs(&layer), vec![1.0]);
        assert!(layer.redo());
        assert_eq!(xs(&layer), vec![1.0, 2.0]);
        assert!(!layer.redo());
    }

    #[test]
    fn test_commit_clears_redo() {
        let mut layer = Layer::default();
        layer.commit(stroke(1.0));
        layer.undo();
        assert!(layer.can_redo());

        layer.commit(stroke(2.0));
        assert!(!layer.can_redo());
        assert_eq!(xs(&layer), vec![2.0]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut layer = Layer::new(3);
        for i in 0..10 {
            layer.commit(stroke(i as f64));
        }
        assert_eq!(layer.undo_depth(), 3);

        while layer.undo() {}
        assert_eq!(layer.len(), 7);
    }

    #[test]
    fn test_redo_strokes() {
        let mut layer = Layer::default();
        for i in 0..4 {
            layer.commit(stroke(i as f64));
        }
        layer.undo();
        layer.undo();
        let redo: Vec<f64> = layer.redo_strokes().iter().map(|s| s.nodes[0].x).collect();
        assert_eq!(redo, vec![2.0, 3.0]);
    }

    #[test]
    fn test_restore_rebuilds_identical_history() {
        let mut original = Layer::default();
        for i in 0..5 {
            original.commit(stroke(i as f64));
        }
        original.undo();
        original.undo();

        let mut copy = Layer::default();
        copy.restore(
            original.strokes().cloned().collect(),
            original.undo_depth(),
            original.redo_strokes(),
        );
        assert_eq!(copy.undo_depth(), original.undo_depth());
        assert_eq!(copy.redo_depth(), original.redo_depth());

        // both layers must walk through the same states
        loop {
            assert_eq!(xs(&copy), xs(&original));
            let (a, b) = (copy.undo(), original.undo());
            assert_eq!(a, b);
            if !a {
                break;
            }
        }
        loop {
            assert_eq!(xs(&copy), xs(&original));
            let (a, b) = (copy.redo(), original.redo());
            assert_eq!(a, b);
            if !a {
                break;
            }
        }
    }

    #[test]
    fn test_restore_clamps_depth() {
        let mut layer = Layer::new(2);
        layer.restore(vec![stroke(0.0), stroke(1.0), stroke(2.0)], 99, Vec::new());
        assert_eq!(layer.undo_depth(), 2);
        assert!(layer.undo());
        assert_eq!(xs(&layer), vec![0.0, 1.0]);
    }
}
