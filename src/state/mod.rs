use crate::badge::ChromeBadge;
use crate::drag::DragPreview;
use crate::error::PanelError;
use crate::frames::web::WebFrameHost;
use crate::models::{Note, NoteId};
use crate::ordering::NoteList;
use crate::panel::PanelController;
use crate::storage::ChromeSyncStorage;
use crate::util::user_message;
use leptos::prelude::*;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

pub(crate) type BrowserPanel = PanelController<ChromeSyncStorage, ChromeBadge, WebFrameHost>;
pub(crate) type PanelHandle = Rc<RefCell<BrowserPanel>>;

#[derive(Clone)]
pub(crate) struct PanelState {
    /// Mirror of the controller's collection, refreshed after every change.
    pub notes: RwSignal<Vec<Note>>,

    /// Order the cards were first rendered in. Never reshuffled, so reordering
    /// only touches CSS `order` and embedded frames stay attached.
    pub mount_order: RwSignal<Vec<NoteId>>,

    /// Display position per note, derived from `notes`.
    pub ranks: Memo<HashMap<NoteId, usize>>,

    /// Live reorder preview while a drag gesture is active.
    pub drag_preview: RwSignal<Option<DragPreview>>,

    pub error: RwSignal<Option<String>>,

    controller: StoredValue<Option<PanelHandle>, LocalStorage>,
}

impl PanelState {
    pub fn new() -> Self {
        let notes = RwSignal::new(vec![]);
        Self {
            notes,
            mount_order: RwSignal::new(vec![]),
            ranks: Memo::new(move |_| notes.with(|ns: &Vec<Note>| display_ranks(ns))),
            drag_preview: RwSignal::new(None),
            error: RwSignal::new(None),
            controller: StoredValue::new_local(None),
        }
    }

    pub fn attach(&self, handle: PanelHandle) {
        self.controller.set_value(Some(handle));
    }

    pub fn detach(&self) -> Option<PanelHandle> {
        let handle = self.controller.try_get_value().flatten();
        self.controller.try_set_value(None);
        handle
    }

    /// Run `f` against the controller. Returns `None` if it is gone or busy.
    pub fn run<R>(&self, f: impl FnOnce(&mut BrowserPanel) -> R) -> Option<R> {
        let handle = self.controller.try_get_value().flatten()?;
        let Ok(mut panel) = handle.try_borrow_mut() else {
            tracing::warn!("panel busy; ui event dropped");
            return None;
        };
        Some(f(&mut panel))
    }

    /// Like [`run`](Self::run) for fallible commands: errors go to the alert area.
    pub fn command<R>(&self, f: impl FnOnce(&mut BrowserPanel) -> Result<R, PanelError>) -> Option<R> {
        match self.run(f)? {
            Ok(r) => {
                self.error.set(None);
                Some(r)
            }
            Err(e) => {
                tracing::info!(error = %e, "command rejected");
                self.error.set(Some(user_message(&e)));
                None
            }
        }
    }

    /// Drop the reorder preview once the controller has ended the gesture
    /// on its own (a note was added, removed or moved mid-drag).
    pub fn settle_preview(&self) {
        if self.drag_preview.with_untracked(Option::is_none) {
            return;
        }
        if self.run(|p| p.drag().is_dragging()) == Some(false) {
            self.drag_preview.set(None);
        }
    }

    /// Listener body for [`PanelController::subscribe`].
    pub fn sync(&self, notes: &[Note]) {
        let notes = notes.to_vec();
        self.mount_order
            .update(|order| *order = sync_mount_order(order, &notes));
        self.notes.set(notes);
    }
}

impl Default for PanelState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub(crate) struct PanelContext(pub PanelState);

/// Keep surviving ids where they are and append new ones.
pub(crate) fn sync_mount_order(previous: &[NoteId], notes: &[Note]) -> Vec<NoteId> {
    let mut order: Vec<NoteId> = previous
        .iter()
        .filter(|id| notes.iter().any(|n| n.id == **id))
        .cloned()
        .collect();
    for n in notes {
        if !order.contains(&n.id) {
            order.push(n.id.clone());
        }
    }
    order
}

/// Display position of every note.
pub(crate) fn display_ranks(notes: &[Note]) -> HashMap<NoteId, usize> {
    NoteList::new(notes.to_vec())
        .ids_in_display_order()
        .into_iter()
        .enumerate()
        .map(|(rank, id)| (id, rank))
        .collect()
}
