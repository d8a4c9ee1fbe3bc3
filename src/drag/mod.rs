//! Pointer drag-to-reorder over the note list.
//!
//! The controller never touches DOM nodes. During a gesture it only produces
//! a *visual* sequence (notes plus one placeholder slot) that the view maps to
//! CSS `order` values; the logical collection changes once, on drop. This keeps
//! the dragged card (and any live frame inside it) attached to the document.

use crate::error::DragError;
use crate::models::NoteId;

/// Vertical extent of a visible note row, in client coordinates.
#[derive(Clone, Debug, PartialEq)]
pub struct RowBox {
    pub id: NoteId,
    pub top: f64,
    pub height: f64,
}

impl RowBox {
    pub fn midpoint(&self) -> f64 {
        self.top + self.height / 2.0
    }
}

/// One position in the visual sequence while dragging.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Note(NoteId),
    Placeholder,
}

/// An in-progress gesture.
#[derive(Clone, Debug, PartialEq)]
pub struct DragGesture {
    dragged: NoteId,
    origin_index: usize,
    /// Display order captured at gesture start, dragged note excluded.
    others: Vec<NoteId>,
    /// Insertion index into `others`.
    placeholder_index: usize,
    placeholder_height: f64,
    highlighted: Vec<NoteId>,
}

impl DragGesture {
    pub fn dragged(&self) -> &NoteId {
        &self.dragged
    }

    pub fn origin_index(&self) -> usize {
        self.origin_index
    }

    pub fn placeholder_index(&self) -> usize {
        self.placeholder_index
    }

    pub fn placeholder_height(&self) -> f64 {
        self.placeholder_height
    }

    pub fn highlighted(&self) -> &[NoteId] {
        &self.highlighted
    }

    /// Visual sequence: remaining notes with the placeholder spliced in.
    pub fn visual_slots(&self) -> Vec<Slot> {
        let mut slots: Vec<Slot> = self.others.iter().cloned().map(Slot::Note).collect();
        slots.insert(self.placeholder_index.min(slots.len()), Slot::Placeholder);
        slots
    }

    /// Snapshot for the view layer.
    pub fn preview(&self) -> DragPreview {
        DragPreview {
            dragged: self.dragged.clone(),
            slots: self.visual_slots(),
            highlighted: self.highlighted.clone(),
            placeholder_height: self.placeholder_height,
        }
    }
}

/// What the view needs to render the live reorder preview.
#[derive(Clone, Debug, PartialEq)]
pub struct DragPreview {
    pub dragged: NoteId,
    pub slots: Vec<Slot>,
    pub highlighted: Vec<NoteId>,
    pub placeholder_height: f64,
}

impl DragPreview {
    /// CSS `order` for a note row, `None` for the dragged row.
    pub fn visual_order_of(&self, id: &NoteId) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| matches!(s, Slot::Note(n) if n == id))
    }

    pub fn placeholder_order(&self) -> usize {
        self.slots
            .iter()
            .position(|s| *s == Slot::Placeholder)
            .unwrap_or(self.slots.len())
    }

    pub fn is_highlighted(&self, id: &NoteId) -> bool {
        self.highlighted.iter().any(|h| h == id)
    }
}

/// A reorder to apply to the note list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorderCommit {
    pub id: NoteId,
    pub from: usize,
    pub to: usize,
}

#[derive(Clone, Debug, Default, PartialEq)]
enum DragState {
    #[default]
    Idle,
    Dragging(DragGesture),
}

#[derive(Clone, Debug)]
pub struct DragController {
    state: DragState,
    highlight_px: f64,
}

impl DragController {
    pub fn new(highlight_px: f64) -> Self {
        Self {
            state: DragState::Idle,
            highlight_px,
        }
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging(_))
    }

    pub fn gesture(&self) -> Option<&DragGesture> {
        match &self.state {
            DragState::Dragging(g) => Some(g),
            DragState::Idle => None,
        }
    }

    /// Begin a gesture on `dragged`. `display_order` is the current logical order.
    pub fn start(
        &mut self,
        dragged: &NoteId,
        display_order: &[NoteId],
        height: f64,
    ) -> Result<DragPreview, DragError> {
        if self.is_dragging() {
            return Err(DragError::GestureActive);
        }
        let origin_index = display_order
            .iter()
            .position(|id| id == dragged)
            .ok_or_else(|| DragError::UnknownNote(dragged.clone()))?;

        let others: Vec<NoteId> = display_order
            .iter()
            .filter(|id| *id != dragged)
            .cloned()
            .collect();

        let gesture = DragGesture {
            dragged: dragged.clone(),
            origin_index,
            others,
            placeholder_index: origin_index,
            placeholder_height: height.max(0.0),
            highlighted: Vec::new(),
        };
        let preview = gesture.preview();
        tracing::debug!(note = %dragged, origin_index, "drag started");
        self.state = DragState::Dragging(gesture);
        Ok(preview)
    }

    /// Track the pointer. `rows` are the visible note rows in visual order,
    /// excluding the dragged row and the placeholder.
    pub fn pointer_moved(&mut self, pointer_y: f64, rows: &[RowBox]) -> Option<DragPreview> {
        let highlight_px = self.highlight_px;
        let DragState::Dragging(g) = &mut self.state else {
            return None;
        };

        // Last row whose midpoint is above the pointer; insert after it.
        let insert_after = rows
            .iter()
            .rposition(|r| r.midpoint() < pointer_y)
            .and_then(|i| g.others.iter().position(|id| *id == rows[i].id));
        g.placeholder_index = match insert_after {
            Some(i) => i + 1,
            None => 0,
        };

        g.highlighted = rows
            .iter()
            .filter(|r| (r.midpoint() - pointer_y).abs() <= highlight_px)
            .map(|r| r.id.clone())
            .collect();

        Some(g.preview())
    }

    /// Finish the gesture. Returns a commit only if the position changed.
    pub fn drop(&mut self) -> Option<ReorderCommit> {
        let DragState::Dragging(g) = std::mem::take(&mut self.state) else {
            return None;
        };
        let to = g.placeholder_index.min(g.others.len());
        tracing::debug!(note = %g.dragged, from = g.origin_index, to, "drag dropped");
        (to != g.origin_index).then(|| ReorderCommit {
            id: g.dragged,
            from: g.origin_index,
            to,
        })
    }

    /// Abandon the gesture without committing.
    pub fn cancel(&mut self) {
        if let DragState::Dragging(g) = std::mem::take(&mut self.state) {
            tracing::debug!(note = %g.dragged, "drag cancelled");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(xs: &[&str]) -> Vec<NoteId> {
        xs.iter().map(|x| NoteId::from(*x)).collect()
    }

    /// Rows of 100px stacked from y=0, skipping `except`.
    fn rows(order: &[&str], except: &str) -> Vec<RowBox> {
        order
            .iter()
            .filter(|id| **id != except)
            .enumerate()
            .map(|(i, id)| RowBox {
                id: NoteId::from(*id),
                top: i as f64 * 100.0,
                height: 100.0,
            })
            .collect()
    }

    #[test]
    fn test_start_puts_placeholder_at_origin() {
        let mut d = DragController::new(100.0);
        let p = d
            .start(&NoteId::from("b"), &ids(&["a", "b", "c"]), 80.0)
            .expect("start");
        assert_eq!(
            p.slots,
            vec![
                Slot::Note(NoteId::from("a")),
                Slot::Placeholder,
                Slot::Note(NoteId::from("c")),
            ]
        );
        assert_eq!(p.placeholder_height, 80.0);
        assert_eq!(p.visual_order_of(&NoteId::from("b")), None);
    }

    #[test]
    fn test_second_gesture_is_rejected() {
        let mut d = DragController::new(100.0);
        d.start(&NoteId::from("a"), &ids(&["a", "b"]), 10.0)
            .expect("start");
        assert_eq!(
            d.start(&NoteId::from("b"), &ids(&["a", "b"]), 10.0),
            Err(DragError::GestureActive)
        );
        assert_eq!(d.gesture().map(|g| g.dragged().as_str()), Some("a"));
    }

    #[test]
    fn test_unknown_note_cannot_start() {
        let mut d = DragController::new(100.0);
        assert_eq!(
            d.start(&NoteId::from("z"), &ids(&["a"]), 10.0),
            Err(DragError::UnknownNote(NoteId::from("z")))
        );
        assert!(!d.is_dragging());
    }

    #[test]
    fn test_drag_first_to_last_commits() {
        let order = ["a", "b", "c", "d"];
        let mut d = DragController::new(100.0);
        d.start(&NoteId::from("a"), &ids(&order), 100.0)
            .expect("start");

        // b,c,d occupy 0..300; pointer below d's midpoint (250).
        let p = d.pointer_moved(280.0, &rows(&order, "a")).expect("preview");
        assert_eq!(p.placeholder_order(), 3);

        assert_eq!(
            d.drop(),
            Some(ReorderCommit {
                id: NoteId::from("a"),
                from: 0,
                to: 3
            })
        );
        assert!(!d.is_dragging());
    }

    #[test]
    fn test_pointer_above_everything_moves_to_top() {
        let order = ["a", "b", "c"];
        let mut d = DragController::new(100.0);
        d.start(&NoteId::from("c"), &ids(&order), 100.0)
            .expect("start");
        d.pointer_moved(-5.0, &rows(&order, "c"));
        assert_eq!(
            d.drop(),
            Some(ReorderCommit {
                id: NoteId::from("c"),
                from: 2,
                to: 0
            })
        );
    }

    #[test]
    fn test_drop_in_place_yields_no_commit() {
        let order = ["a", "b", "c"];
        let mut d = DragController::new(100.0);
        d.start(&NoteId::from("b"), &ids(&order), 100.0)
            .expect("start");
        // a's midpoint is 50, c's is 150: pointer between keeps index 1.
        d.pointer_moved(100.0, &rows(&order, "b"));
        assert_eq!(d.drop(), None);
    }

    #[test]
    fn test_cancel_never_commits() {
        let order = ["a", "b", "c"];
        let mut d = DragController::new(100.0);
        d.start(&NoteId::from("a"), &ids(&order), 100.0)
            .expect("start");
        d.pointer_moved(500.0, &rows(&order, "a"));
        d.cancel();
        assert!(!d.is_dragging());
        assert_eq!(d.drop(), None);
    }

    #[test]
    fn test_highlight_uses_distance_threshold() {
        let order = ["a", "b", "c", "d"];
        let mut d = DragController::new(100.0);
        d.start(&NoteId::from("a"), &ids(&order), 100.0)
            .expect("start");
        // Midpoints 50, 150, 250.
        let p = d.pointer_moved(60.0, &rows(&order, "a")).expect("preview");
        assert_eq!(p.highlighted, ids(&["b", "c"]));
        assert!(p.is_highlighted(&NoteId::from("b")));
        assert!(!p.is_highlighted(&NoteId::from("d")));
    }

    #[test]
    fn test_moves_when_idle_are_ignored() {
        let mut d = DragController::new(100.0);
        assert_eq!(d.pointer_moved(10.0, &[]), None);
        d.cancel();
        assert_eq!(d.drop(), None);
    }
}
