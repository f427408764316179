//! Tool selection for an artist.
//!
//! The same key actions apply to local and remote artists, so a peer's tool
//! state follows the key events it relays.

use serde::{Deserialize, Serialize};

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ToolKind {
    Pan,
    Zoom,
    Rotate,
    #[default]
    Brush,
    Eraser,
    Eyedropper,
}

impl ToolKind {
    /// Whether pointer events with this tool produce strokes.
    pub fn paints(&self) -> bool {
        matches!(self, ToolKind::Brush | ToolKind::Eraser)
    }
}

/// When a key action fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Down,
    Up,
    /// Release after the pointer was pressed while the key was held. A tap
    /// leaves the tool selected.
    HoldRelease,
}

/// What a key action does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Select(ToolKind),
    SelectPrevious,
}

/// Key bindings: (key, trigger, action). Keys are lowercase.
const KEY_ACTIONS: &[(&str, Trigger, Action)] = &[
    (" ", Trigger::Down, Action::Select(ToolKind::Pan)),
    (" ", Trigger::Up, Action::SelectPrevious),
    ("mousemiddle", Trigger::Down, Action::Select(ToolKind::Pan)),
    ("mousemiddle", Trigger::Up, Action::SelectPrevious),
    ("z", Trigger::Down, Action::Select(ToolKind::Zoom)),
    ("z", Trigger::HoldRelease, Action::SelectPrevious),
    ("r", Trigger::Down, Action::Select(ToolKind::Rotate)),
    ("r", Trigger::HoldRelease, Action::SelectPrevious),
    ("b", Trigger::Up, Action::Select(ToolKind::Brush)),
    ("e", Trigger::Up, Action::Select(ToolKind::Eraser)),
    ("alt", Trigger::Down, Action::Select(ToolKind::Eyedropper)),
    ("alt", Trigger::Up, Action::SelectPrevious),
];

fn is_bound(key: &str) -> bool {
    KEY_ACTIONS.iter().any(|(bound, _, _)| *bound == key)
}

/// A bound key that is currently down.
#[derive(Debug, Clone)]
struct HeldKey {
    key: &'static str,
    /// The pointer was pressed while the key was down.
    used: bool,
}

/// Manages the current tool of one artist.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    current: ToolKind,
    previous: Option<ToolKind>,
    /// Bound keys currently held, used to ignore auto-repeat. Never longer
    /// than the binding table.
    held_keys: Vec<HeldKey>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Currently selected tool.
    pub fn selected_tool(&self) -> ToolKind {
        self.current
    }

    /// Select a tool, remembering the one it replaces.
    pub fn select_tool(&mut self, tool: ToolKind) {
        if tool != self.current {
            self.previous = Some(self.current);
            self.current = tool;
        }
    }

    /// Return to the tool selected before the last change.
    pub fn select_previous_tool(&mut self) {
        if let Some(previous) = self.previous.take() {
            self.previous = Some(self.current);
            self.current = previous;
        }
    }

    /// Apply a key press. Returns true if the selected tool changed.
    /// Unbound keys are ignored.
    pub fn key_down(&mut self, key: &str) -> bool {
        let key = key.to_lowercase();
        let Some(bound) = KEY_ACTIONS
            .iter()
            .map(|(bound, _, _)| *bound)
            .find(|bound| *bound == key)
        else {
            return false;
        };
        if self.is_held(bound) {
            return false;
        }
        self.held_keys.push(HeldKey {
            key: bound,
            used: false,
        });
        self.apply(bound, Trigger::Down)
    }

    /// Apply a key release. Returns true if the selected tool changed.
    pub fn key_up(&mut self, key: &str) -> bool {
        let key = key.to_lowercase();
        if !is_bound(&key) {
            return false;
        }
        let used = match self.held_keys.iter().position(|h| h.key == key) {
            Some(pos) => self.held_keys.remove(pos).used,
            None => false,
        };
        let before = self.current;
        self.apply(&key, Trigger::Up);
        if used {
            self.apply(&key, Trigger::HoldRelease);
        }
        before != self.current
    }

    /// Record a pointer press, so held keys count as held rather than tapped.
    pub fn pointer_down(&mut self) {
        for held in &mut self.held_keys {
            held.used = true;
        }
    }

    fn is_held(&self, key: &str) -> bool {
        self.held_keys.iter().any(|h| h.key == key)
    }

    #[cfg(test)]
    fn held_len(&self) -> usize {
        self.held_keys.len()
    }

    fn apply(&mut self, key: &str, trigger: Trigger) -> bool {
        let before = self.current;
        for (bound, bound_trigger, action) in KEY_ACTIONS {
            if *bound == key && *bound_trigger == trigger {
                match action {
                    Action::Select(tool) => self.select_tool(*tool),
                    Action::SelectPrevious => self.select_previous_tool(),
                }
            }
        }
        before != self.current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_selection() {
        let mut tm = ToolManager::new();
        assert_eq!(tm.selected_tool(), ToolKind::Brush);

        tm.select_tool(ToolKind::Eraser);
        assert_eq!(tm.selected_tool(), ToolKind::Eraser);

        tm.select_previous_tool();
        assert_eq!(tm.selected_tool(), ToolKind::Brush);
    }

    #[test]
    fn test_momentary_pan() {
        let mut tm = ToolManager::new();
        tm.select_tool(ToolKind::Eraser);

        assert!(tm.key_down(" "));
        assert_eq!(tm.selected_tool(), ToolKind::Pan);
        // auto-repeat is ignored
        assert!(!tm.key_down(" "));

        assert!(tm.key_up(" "));
        assert_eq!(tm.selected_tool(), ToolKind::Eraser);
    }

    #[test]
    fn test_keys_select_on_release() {
        let mut tm = ToolManager::new();
        assert!(!tm.key_down("E"));
        assert_eq!(tm.selected_tool(), ToolKind::Brush);
        assert!(tm.key_up("E"));
        assert_eq!(tm.selected_tool(), ToolKind::Eraser);
    }

    #[test]
    fn test_unbound_key_is_ignored() {
        let mut tm = ToolManager::new();
        assert!(!tm.key_down("q"));
        assert!(!tm.key_up("q"));
        assert_eq!(tm.selected_tool(), ToolKind::Brush);
    }

    #[test]
    fn test_paints() {
        assert!(ToolKind::Brush.paints());
        assert!(ToolKind::Eraser.paints());
        assert!(!ToolKind::Pan.paints());
        assert!(!ToolKind::Eyedropper.paints());
    }

    #[test]
    fn test_unbound_keys_are_not_retained() {
        let mut tm = ToolManager::new();
        for i in 0..1000 {
            assert!(!tm.key_down(&format!("key{i}")));
        }
        assert_eq!(tm.held_len(), 0);

        tm.key_down(" ");
        tm.key_down("Z");
        tm.key_down("z");
        assert_eq!(tm.held_len(), 2);
        tm.key_up(" ");
        tm.key_up("z");
        assert_eq!(tm.held_len(), 0);
    }

    #[test]
    fn test_tapped_zoom_stays_selected() {
        let mut tm = ToolManager::new();
        assert!(tm.key_down("z"));
        assert!(!tm.key_up("z"));
        assert_eq!(tm.selected_tool(), ToolKind::Zoom);

        assert!(tm.key_down("r"));
        assert!(!tm.key_up("r"));
        assert_eq!(tm.selected_tool(), ToolKind::Rotate);
    }

    #[test]
    fn test_held_zoom_reverts_on_release() {
        let mut tm = ToolManager::new();
        tm.select_tool(ToolKind::Eraser);
        assert!(tm.key_down("z"));
        tm.pointer_down();
        assert!(tm.key_up("z"));
        assert_eq!(tm.selected_tool(), ToolKind::Eraser);
    }

    #[test]
    fn test_space_reverts_without_pointer() {
        let mut tm = ToolManager::new();
        tm.key_down(" ");
        tm.key_up(" ");
        assert_eq!(tm.selected_tool(), ToolKind::Brush);
    }
}
