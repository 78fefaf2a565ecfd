//! Client-side mirror of the shared canvas history with local undo/redo.

use std::collections::{HashMap, HashSet};

use crate::action::{ActionId, DrawAction};

/// The client's copy of the canvas.
///
/// History is an ordered list of actions (back to front). Undo and redo
/// stacks hold action ids; actions that have been undone are parked in
/// `undone` so redo can bring them back.
#[derive(Debug, Clone, Default)]
pub struct CanvasModel {
    /// Actions in paint order.
    history: Vec<DrawAction>,
    /// Undo history stack.
    undo_stack: Vec<ActionId>,
    /// Redo history stack.
    redo_stack: Vec<ActionId>,
    /// Actions removed by undo, keyed for redo.
    undone: HashMap<ActionId, DrawAction>,
    /// Locally drawn actions whose hub echo has not arrived yet.
    pending: HashSet<ActionId>,
}

impl CanvasModel {
    /// Create a new empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action; new edits invalidate redo.
    pub fn append(&mut self, action: DrawAction) {
        self.undo_stack.push(action.id());
        self.history.push(action);
        self.clear_redo();
    }

    /// Add an action drawn by this client before the hub has confirmed it.
    pub fn append_local(&mut self, action: DrawAction) {
        self.pending.insert(action.id());
        self.append(action);
    }

    /// Apply a draw echoed by the hub.
    ///
    /// An action this client already applied optimistically is moved to the
    /// end of history and to the top of the undo stack, which is where the
    /// hub's global order put it. Returns true if the action was already known.
    pub fn confirm(&mut self, action: DrawAction) -> bool {
        let id = action.id();
        self.pending.remove(&id);
        let Some(pos) = self.history.iter().position(|a| a.id() == id) else {
            self.undone.remove(&id);
            self.redo_stack.retain(|&r| r != id);
            self.append(action);
            return false;
        };
        let existing = self.history.remove(pos);
        self.history.push(existing);
        self.undo_stack.retain(|&u| u != id);
        self.undo_stack.push(id);
        true
    }

    /// Undo the most recent confirmed action.
    ///
    /// Pending actions are skipped: the hub has not ordered them yet, so they
    /// cannot be the element a global undo removed.
    /// Returns true if undo was performed, false if nothing to undo.
    pub fn undo(&mut self) -> bool {
        let Some(pos) = self
            .undo_stack
            .iter()
            .rposition(|id| !self.pending.contains(id))
        else {
            return false;
        };
        let id = self.undo_stack.remove(pos);
        if let Some(idx) = self.history.iter().position(|a| a.id() == id) {
            let action = self.history.remove(idx);
            self.undone.insert(id, action);
        }
        self.redo_stack.push(id);
        true
    }

    /// Redo the last undone action.
    /// Returns true if redo was performed, false if nothing to redo.
    pub fn redo(&mut self) -> bool {
        while let Some(id) = self.redo_stack.pop() {
            if let Some(action) = self.undone.remove(&id) {
                self.history.push(action);
                self.undo_stack.push(id);
                return true;
            }
        }
        false
    }

    /// Remove everything, including undo and redo state.
    ///
    /// Pending ids are kept: their echo is still on its way and will append
    /// them after the clear, exactly as the hub ordered them.
    pub fn clear(&mut self) {
        self.history.clear();
        self.undo_stack.clear();
        self.clear_redo();
    }

    /// Replace the history wholesale with a hub snapshot.
    ///
    /// The undo stack is reseeded with the snapshot so shared state that
    /// existed before this client joined can still be undone.
    pub fn set_snapshot(&mut self, snapshot: Vec<DrawAction>) {
        for action in &snapshot {
            self.pending.remove(&action.id());
        }
        self.undo_stack = snapshot.iter().map(DrawAction::id).collect();
        self.history = snapshot;
        self.clear_redo();
    }

    fn clear_redo(&mut self) {
        self.redo_stack.clear();
        self.undone.clear();
    }

    /// Actions in paint order, for the renderer.
    pub fn history(&self) -> &[DrawAction] {
        &self.history
    }

    pub fn history_copy(&self) -> Vec<DrawAction> {
        self.history.clone()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn contains(&self, id: ActionId) -> bool {
        self.history.iter().any(|a| a.id() == id)
    }

    /// Check if undo is available.
    pub fn can_undo(&self) -> bool {
        self.undo_stack.iter().any(|id| !self.pending.contains(id))
    }

    /// Check if redo is available.
    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.redo_stack.len()
    }

    /// Number of local actions still waiting for their hub echo.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::Rgb;
    use kurbo::Point;

    fn line(n: f64) -> DrawAction {
        DrawAction::line(Point::new(0.0, 0.0), Point::new(n, n), Rgb::BLACK, 2.0)
    }

    fn ids(model: &CanvasModel) -> Vec<ActionId> {
        model.history().iter().map(DrawAction::id).collect()
    }

    #[test]
    fn test_append_clears_redo() {
        let mut model = CanvasModel::new();
        model.append(line(1.0));
        model.append(line(2.0));
        assert!(model.undo());
        assert!(model.can_redo());

        model.append(line(3.0));
        assert!(!model.can_redo());
        assert_eq!(model.len(), 2);
    }

    #[test]
    fn test_undo_redo_round_trip() {
        let mut model = CanvasModel::new();
        model.append(line(1.0));
        let a = line(2.0);
        model.append(a.clone());

        let history = model.history_copy();
        let (undo_depth, redo_depth) = (model.undo_depth(), model.redo_depth());

        assert!(model.undo());
        assert!(!model.contains(a.id()));
        assert_eq!(model.len(), 1);

        assert!(model.redo());
        assert_eq!(model.history_copy(), history);
        assert_eq!(model.undo_depth(), undo_depth);
        assert_eq!(model.redo_depth(), redo_depth);
    }

    #[test]
    fn test_undo_redo_on_empty_are_noops() {
        let mut model = CanvasModel::new();
        assert!(!model.undo());
        assert!(!model.redo());
        model.clear();
        assert!(model.is_empty());
    }

    #[test]
    fn test_undo_removes_by_id_not_equality() {
        let mut model = CanvasModel::new();
        let a = line(1.0);
        let b = line(1.0);
        model.append(a.clone());
        model.append(b.clone());

        model.undo();
        assert_eq!(ids(&model), vec![a.id()]);
    }

    #[test]
    fn test_set_snapshot_replaces_history() {
        let mut model = CanvasModel::new();
        model.append(line(9.0));
        model.undo();

        let snapshot = vec![line(1.0), line(2.0), line(3.0)];
        model.set_snapshot(snapshot.clone());

        assert_eq!(model.history(), snapshot.as_slice());
        assert_eq!(model.undo_depth(), 3);
        assert!(!model.can_redo());

        // Pre-existing shared state is undoable.
        model.undo();
        assert_eq!(model.history(), &snapshot[..2]);
    }

    #[test]
    fn test_confirm_does_not_duplicate_local_draw() {
        let mut model = CanvasModel::new();
        let a = line(1.0);
        model.append_local(a.clone());
        assert_eq!(model.pending_count(), 1);

        assert!(model.confirm(a.clone()));
        assert_eq!(model.len(), 1);
        assert_eq!(model.pending_count(), 0);
    }

    #[test]
    fn test_confirm_reorders_into_hub_order() {
        let mut model = CanvasModel::new();
        let mine = line(1.0);
        let theirs = line(2.0);

        // Local draw applied first, but the hub ordered the remote draw first.
        model.append_local(mine.clone());
        model.confirm(theirs.clone());
        model.confirm(mine.clone());

        assert_eq!(ids(&model), vec![theirs.id(), mine.id()]);
    }

    #[test]
    fn test_remote_undo_skips_pending_local_draw() {
        let mut model = CanvasModel::new();
        let shared = line(1.0);
        model.confirm(shared.clone());

        let mine = line(2.0);
        model.append_local(mine.clone());

        // Hub undid `shared` before it saw `mine`.
        assert!(model.undo());
        assert_eq!(ids(&model), vec![mine.id()]);

        model.confirm(mine.clone());
        assert_eq!(ids(&model), vec![mine.id()]);
    }

    #[test]
    fn test_clear_then_late_echo() {
        let mut model = CanvasModel::new();
        let mine = line(1.0);
        model.append_local(mine.clone());

        // A clear ordered before our draw wipes it locally; the echo restores it.
        model.clear();
        assert!(model.is_empty());
        assert!(!model.confirm(mine.clone()));
        assert_eq!(ids(&model), vec![mine.id()]);
        assert_eq!(model.pending_count(), 0);
    }
}
