//! The in-memory note collection and its display ordering.
//!
//! Display order is always "sort by `order` ascending, stable for ties"; the
//! backing vector's own sequence only breaks ties. `order` values need not be
//! contiguous and duplicates are tolerated.

use crate::models::{Note, NoteId};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct NoteList {
    notes: Vec<Note>,
}

impl NoteList {
    pub fn new(notes: Vec<Note>) -> Self {
        Self { notes }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Backing sequence (not display order).
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn into_notes(self) -> Vec<Note> {
        self.notes
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| &n.id == id)
    }

    pub fn get_mut(&mut self, id: &NoteId) -> Option<&mut Note> {
        self.notes.iter_mut().find(|n| &n.id == id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.get(id).is_some()
    }

    /// Notes in display order. Notes without an order sort last.
    pub fn sorted(&self) -> Vec<&Note> {
        let mut out: Vec<&Note> = self.notes.iter().collect();
        out.sort_by_key(|n| sort_key(n));
        out
    }

    pub fn ids_in_display_order(&self) -> Vec<NoteId> {
        self.sorted().into_iter().map(|n| n.id.clone()).collect()
    }

    /// Position of a note in display order.
    pub fn index_of(&self, id: &NoteId) -> Option<usize> {
        self.sorted().iter().position(|n| &n.id == id)
    }

    /// Prepend `note` with order 0, shifting every existing note down by one.
    pub fn insert_at_top(&mut self, mut note: Note) {
        for n in self.notes.iter_mut() {
            if let Some(o) = n.order.as_mut() {
                *o = o.saturating_add(1);
            }
        }
        note.order = Some(0);
        self.notes.insert(0, note);
    }

    /// Swap order with the nearest note whose order is strictly lower.
    pub fn move_up(&mut self, id: &NoteId) -> bool {
        self.swap_with_neighbor(id, Direction::Up)
    }

    /// Swap order with the nearest note whose order is strictly higher.
    pub fn move_down(&mut self, id: &NoteId) -> bool {
        self.swap_with_neighbor(id, Direction::Down)
    }

    fn swap_with_neighbor(&mut self, id: &NoteId, dir: Direction) -> bool {
        let Some(idx) = self.notes.iter().position(|n| &n.id == id) else {
            return false;
        };
        let Some(current) = self.notes[idx].order else {
            return false;
        };

        // Candidates in a stable sort towards `dir`; the first one strictly
        // past `current` is the neighbor.
        let mut candidates: Vec<(usize, i64)> = self
            .notes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.order.map(|o| (i, o)))
            .collect();
        let neighbor = match dir {
            Direction::Up => {
                candidates.sort_by(|a, b| b.1.cmp(&a.1));
                candidates.into_iter().find(|(_, o)| *o < current)
            }
            Direction::Down => {
                candidates.sort_by(|a, b| a.1.cmp(&b.1));
                candidates.into_iter().find(|(_, o)| *o > current)
            }
        };

        let Some((other, other_order)) = neighbor else {
            return false;
        };
        self.notes[idx].order = Some(other_order);
        self.notes[other].order = Some(current);
        true
    }

    /// Remove a note. Remaining order values are left as they are.
    pub fn delete(&mut self, id: &NoteId) -> Option<Note> {
        let idx = self.notes.iter().position(|n| &n.id == id)?;
        Some(self.notes.remove(idx))
    }

    /// Give every note without an order its position in the backing sequence.
    ///
    /// Returns true when anything changed and the collection must be persisted.
    pub fn migrate(&mut self) -> bool {
        let mut changed = false;
        for (i, n) in self.notes.iter_mut().enumerate() {
            if n.order.is_none() {
                n.order = Some(i as i64);
                changed = true;
            }
        }
        changed
    }

    /// Move a note to display index `to`, then renumber every note to its new
    /// display position and store the backing sequence in that order.
    pub fn move_to_index(&mut self, id: &NoteId, to: usize) -> bool {
        let mut ids = self.ids_in_display_order();
        let Some(from) = ids.iter().position(|x| x == id) else {
            return false;
        };
        let to = to.min(ids.len() - 1);
        if from == to {
            return false;
        }

        let moved = ids.remove(from);
        ids.insert(to, moved);

        let mut reordered = Vec::with_capacity(self.notes.len());
        for (pos, nid) in ids.iter().enumerate() {
            if let Some(i) = self.notes.iter().position(|n| &n.id == nid) {
                let mut n = self.notes.swap_remove(i);
                n.order = Some(pos as i64);
                reordered.push(n);
            }
        }
        self.notes = reordered;
        true
    }

    /// Replace everything (e.g. after a change made by another page).
    pub fn replace(&mut self, notes: Vec<Note>) {
        self.notes = notes;
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Up,
    Down,
}

fn sort_key(n: &Note) -> (bool, i64) {
    match n.order {
        Some(o) => (false, o),
        None => (true, 0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn note(id: &str, order: Option<i64>) -> Note {
        let mut n = Note::new(NoteId::from(id), 0);
        n.order = order;
        n
    }

    fn list(specs: &[(&str, i64)]) -> NoteList {
        NoteList::new(specs.iter().map(|(id, o)| note(id, Some(*o))).collect())
    }

    fn orders(l: &NoteList) -> Vec<(String, Option<i64>)> {
        l.notes()
            .iter()
            .map(|n| (n.id.to_string(), n.order))
            .collect()
    }

    fn display(l: &NoteList) -> Vec<String> {
        l.ids_in_display_order()
            .into_iter()
            .map(|id| id.to_string())
            .collect()
    }

    #[test]
    fn test_insert_at_top_on_empty_list() {
        let mut l = NoteList::default();
        l.insert_at_top(note("x", None));
        assert_eq!(orders(&l), vec![("x".to_string(), Some(0))]);
    }

    #[test]
    fn test_latest_insert_always_sorts_first() {
        let mut l = NoteList::default();
        for id in ["a", "b", "c", "d"] {
            l.insert_at_top(note(id, None));
            assert_eq!(display(&l)[0], id);
            let min = l.notes().iter().filter_map(|n| n.order).min();
            assert_eq!(l.get(&NoteId::from(id)).and_then(|n| n.order), min);
        }
        assert_eq!(display(&l), vec!["d", "c", "b", "a"]);
    }

    #[test]
    fn test_move_down_swaps_with_next() {
        let mut l = list(&[("a", 0), ("b", 1), ("c", 2)]);
        assert!(l.move_down(&NoteId::from("a")));
        assert_eq!(
            orders(&l),
            vec![
                ("a".to_string(), Some(1)),
                ("b".to_string(), Some(0)),
                ("c".to_string(), Some(2)),
            ]
        );
    }

    #[test]
    fn test_move_up_then_down_restores_orders() {
        let mut l = list(&[("a", 0), ("b", 4), ("c", 9)]);
        let before = orders(&l);
        assert!(l.move_up(&NoteId::from("c")));
        assert!(l.move_down(&NoteId::from("c")));
        assert_eq!(orders(&l), before);
    }

    #[test]
    fn test_moves_at_extremes_are_noops() {
        let mut l = list(&[("a", 0), ("b", 1)]);
        assert!(!l.move_up(&NoteId::from("a")));
        assert!(!l.move_down(&NoteId::from("b")));
        assert_eq!(display(&l), vec!["a", "b"]);
    }

    #[test]
    fn test_moves_skip_gaps() {
        let mut l = list(&[("a", 0), ("b", 10), ("c", 20)]);
        assert!(l.move_up(&NoteId::from("c")));
        assert_eq!(display(&l), vec!["a", "c", "b"]);
        assert_eq!(l.get(&NoteId::from("c")).and_then(|n| n.order), Some(10));
    }

    #[test]
    fn test_duplicate_orders_do_not_panic() {
        let mut l = list(&[("a", 1), ("b", 1), ("c", 0), ("d", 0)]);
        assert!(l.move_up(&NoteId::from("a")));
        // First candidate in the descending sort with order 0 is "c".
        assert_eq!(l.get(&NoteId::from("c")).and_then(|n| n.order), Some(1));
        assert_eq!(l.get(&NoteId::from("a")).and_then(|n| n.order), Some(0));

        // Equal neighbours: nothing strictly greater than 1 exists.
        assert!(!l.move_down(&NoteId::from("b")));
        assert_eq!(l.len(), 4);
    }

    #[test]
    fn test_missing_ids_are_silent_noops() {
        let mut l = list(&[("a", 0)]);
        let ghost = NoteId::from("ghost");
        assert!(!l.move_up(&ghost));
        assert!(!l.move_down(&ghost));
        assert!(l.delete(&ghost).is_none());
        assert!(!l.move_to_index(&ghost, 0));
        assert_eq!(l.len(), 1);
    }

    #[test]
    fn test_delete_leaves_gaps() {
        let mut l = list(&[("a", 0), ("b", 1), ("c", 2)]);
        let removed = l.delete(&NoteId::from("b")).expect("b exists");
        assert_eq!(removed.id.as_str(), "b");
        assert_eq!(
            orders(&l),
            vec![("a".to_string(), Some(0)), ("c".to_string(), Some(2))]
        );
    }

    #[test]
    fn test_migrate_assigns_positions_and_is_idempotent() {
        let mut l = NoteList::new(vec![note("a", None), note("b", Some(7)), note("c", None)]);
        assert!(l.migrate());
        let first = orders(&l);
        assert_eq!(
            first,
            vec![
                ("a".to_string(), Some(0)),
                ("b".to_string(), Some(7)),
                ("c".to_string(), Some(2)),
            ]
        );
        assert!(!l.migrate());
        assert_eq!(orders(&l), first);
    }

    #[test]
    fn test_sorted_is_stable_for_ties_and_puts_unordered_last() {
        let l = NoteList::new(vec![
            note("u", None),
            note("a", Some(1)),
            note("b", Some(0)),
            note("c", Some(1)),
        ]);
        assert_eq!(display(&l), vec!["b", "a", "c", "u"]);
    }

    #[test]
    fn test_move_to_index_renumbers_display_sequence() {
        let mut l = list(&[("a", 0), ("b", 5), ("c", 9), ("d", 12)]);
        assert!(l.move_to_index(&NoteId::from("a"), 2));
        assert_eq!(display(&l), vec!["b", "c", "a", "d"]);
        assert_eq!(
            orders(&l),
            vec![
                ("b".to_string(), Some(0)),
                ("c".to_string(), Some(1)),
                ("a".to_string(), Some(2)),
                ("d".to_string(), Some(3)),
            ]
        );
    }

    #[test]
    fn test_move_to_same_index_is_noop_and_far_index_clamps() {
        let mut l = list(&[("a", 0), ("b", 1), ("c", 2)]);
        assert!(!l.move_to_index(&NoteId::from("b"), 1));
        assert!(l.move_to_index(&NoteId::from("a"), 99));
        assert_eq!(display(&l), vec!["b", "c", "a"]);
    }
}
