//! The coordinating object behind the side panel.
//!
//! Created once when the panel UI starts and torn down when it goes away.
//! It owns the board, the frame registry, the drag gesture and the frame
//! navigation states, and keeps them consistent with each other: deleting a
//! note or clearing its URL tears its frame down, a settled resize writes
//! `iframeHeight`, and a drop commits the new order.

use crate::badge::BadgeSink;
use crate::board::{NoteBoard, UrlUpdate};
use crate::config::PanelConfig;
use crate::drag::{DragController, DragPreview, ReorderCommit, RowBox};
use crate::error::{DragError, FrameError, Result};
use crate::frames::nav::FrameNavTracker;
use crate::frames::{FrameHost, FrameManager, MountOutcome};
use crate::messages::{ContentReport, RuntimeMessage};
use crate::models::{Note, NoteColor, NoteId};
use crate::ordering::NoteList;
use crate::storage::{StorageArea, StorageChange};

type Listener = Box<dyn Fn(&[Note])>;

pub struct PanelController<A, B, H: FrameHost> {
    board: NoteBoard<A, B>,
    frames: FrameManager<H>,
    drag: DragController,
    nav: FrameNavTracker,
    clock: fn() -> i64,
    listeners: Vec<Listener>,
}

impl<A: StorageArea, B: BadgeSink, H: FrameHost> PanelController<A, B, H> {
    pub fn new(board: NoteBoard<A, B>, host: H, config: &PanelConfig, clock: fn() -> i64) -> Self {
        let states = board.repo().load_frame_states().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "could not read frame states");
            Default::default()
        });
        let mut nav = FrameNavTracker::new(states);
        // States for notes deleted while the panel was closed.
        nav.retain(|id| board.list().get(id).is_some_and(Note::has_url));

        let mut panel = Self {
            board,
            frames: FrameManager::new(host, config.resize_debounce_ms),
            drag: DragController::new(config.drag_highlight_px),
            nav,
            clock,
            listeners: Vec::new(),
        };
        panel.persist_nav();
        panel
    }

    pub fn notes(&self) -> &NoteList {
        self.board.list()
    }

    pub fn board(&self) -> &NoteBoard<A, B> {
        &self.board
    }

    pub fn frames(&self) -> &FrameManager<H> {
        &self.frames
    }

    pub fn nav(&self) -> &FrameNavTracker {
        &self.nav
    }

    pub fn drag(&self) -> &DragController {
        &self.drag
    }

    /// Called with the whole collection after every change.
    pub fn subscribe(&mut self, listener: impl Fn(&[Note]) + 'static) {
        self.listeners.push(Box::new(listener));
    }

    fn notify(&self) {
        let notes = self.board.list().notes();
        for listener in &self.listeners {
            listener(notes);
        }
    }

    /// Notify when `changed`, passing it through.
    fn changed(&self, changed: bool) -> bool {
        if changed {
            self.notify();
        }
        changed
    }

    fn persist_nav(&mut self) {
        if !self.nav.take_dirty() {
            return;
        }
        let states = self.nav.states().clone();
        if let Err(e) = self.board.repo_mut().save_frame_states(&states) {
            tracing::warn!(error = %e, "could not persist frame states");
        }
    }

    /// Drop the frame and saved navigation for a note that no longer embeds a page.
    fn release_frame(&mut self, id: &NoteId) {
        self.frames.unmount(id);
        self.nav.forget(id);
        self.persist_nav();
    }

    /// Every structural change ends an active drag: its slots were computed
    /// against the old order.
    pub fn add_note(&mut self, content: Option<String>) -> NoteId {
        self.cancel_drag();
        let id = self.board.add_note(content, (self.clock)());
        self.notify();
        id
    }

    pub fn add_url_note(&mut self, url: Option<&str>) -> Result<NoteId> {
        let id = self.board.add_url_note(url, (self.clock)())?;
        self.cancel_drag();
        self.notify();
        Ok(id)
    }

    pub fn delete(&mut self, id: &NoteId) -> bool {
        let Some(note) = self.board.delete(id) else {
            return false;
        };
        self.cancel_drag();
        self.release_frame(&note.id);
        self.changed(true)
    }

    pub fn set_color(&mut self, id: &NoteId, color: NoteColor) -> bool {
        let changed = self.board.set_color(id, color);
        self.changed(changed)
    }

    pub fn set_url(&mut self, id: &NoteId, input: &str) -> Result<UrlUpdate> {
        let update = self.board.set_url(id, input)?;
        match &update {
            UrlUpdate::Cleared => self.release_frame(id),
            UrlUpdate::Set(_) => {
                // A different page: the old scroll position no longer applies.
                self.nav.forget(id);
                self.persist_nav();
            }
            UrlUpdate::Unchanged => {}
        }
        self.changed(update != UrlUpdate::Unchanged);
        Ok(update)
    }

    pub fn update_content(&mut self, id: &NoteId, text: &str) -> bool {
        let changed = self.board.update_content(id, text);
        self.changed(changed)
    }

    pub fn toggle_edit(&mut self, id: &NoteId) -> bool {
        let changed = self.board.toggle_edit(id);
        self.changed(changed)
    }

    pub fn move_up(&mut self, id: &NoteId) -> bool {
        let changed = self.board.move_up(id);
        if changed {
            self.cancel_drag();
        }
        self.changed(changed)
    }

    pub fn move_down(&mut self, id: &NoteId) -> bool {
        let changed = self.board.move_down(id);
        if changed {
            self.cancel_drag();
        }
        self.changed(changed)
    }

    /// Attach (or retarget) the frame for a URL note once its wrapper exists.
    pub fn mount_frame(
        &mut self,
        id: &NoteId,
        container: H::Container,
    ) -> std::result::Result<MountOutcome, FrameError> {
        let note = self
            .board
            .get(id)
            .ok_or_else(|| FrameError::Missing(id.clone()))?;
        self.frames.mount(note, container)
    }

    pub fn frame_resized(&mut self, id: &NoteId) {
        self.frames.on_resize(id);
    }

    /// Resize debounce elapsed for `id`.
    pub fn frame_settled(&mut self, id: &NoteId) {
        let Some(height) = self.frames.on_resize_settled(id) else {
            return;
        };
        let changed = self.board.set_iframe_height(id, height);
        self.changed(changed);
    }

    /// Record what an embedded page reported; ask it to restore its scroll
    /// position when it reloaded the page we have a saved position for.
    pub fn handle_report(&mut self, report: &ContentReport) {
        let id = report.note_id();
        if !self.board.get(id).is_some_and(Note::has_url) {
            tracing::debug!(note = %id, "report for a note without a frame ignored");
            return;
        }
        if let Some(command) = self.nav.apply(report) {
            if let Err(e) = self.frames.post_command(id, &command) {
                tracing::debug!(note = %id, error = %e, "could not restore frame state");
            }
        }
        self.persist_nav();
    }

    /// Dispatch a message arriving over the runtime transport.
    pub fn handle_message(&mut self, message: RuntimeMessage) -> Result<()> {
        match message {
            RuntimeMessage::PanelReady => {
                tracing::debug!("ignoring panelReady echo");
            }
            RuntimeMessage::AddNote { content } => {
                self.add_note(content);
            }
            RuntimeMessage::AddUrlNote { url } => {
                self.add_url_note(url.as_deref())?;
            }
            RuntimeMessage::FrameReport { report } => self.handle_report(&report),
        }
        Ok(())
    }

    /// Start dragging `id`. Frames stop taking pointer input until the gesture ends.
    pub fn begin_drag(
        &mut self,
        id: &NoteId,
        height: f64,
    ) -> std::result::Result<DragPreview, DragError> {
        let order = self.board.list().ids_in_display_order();
        let preview = self.drag.start(id, &order, height)?;
        self.frames.set_input_enabled(false);
        Ok(preview)
    }

    pub fn drag_moved(&mut self, pointer_y: f64, rows: &[RowBox]) -> Option<DragPreview> {
        self.drag.pointer_moved(pointer_y, rows)
    }

    /// Finish the gesture, committing the new position if it changed.
    pub fn drop_drag(&mut self) -> Option<ReorderCommit> {
        if !self.drag.is_dragging() {
            return None;
        }
        let commit = self.drag.drop();
        self.frames.set_input_enabled(true);
        let commit = commit?;
        if self.board.move_to_index(&commit.id, commit.to) {
            self.notify();
        }
        Some(commit)
    }

    pub fn cancel_drag(&mut self) {
        if !self.drag.is_dragging() {
            return;
        }
        self.drag.cancel();
        self.frames.set_input_enabled(true);
    }

    /// Another extension page rewrote the stored collection. Returns `false`
    /// when it already matches what the panel holds.
    pub fn external_change(&mut self, change: StorageChange) -> bool {
        let notes = change.notes.unwrap_or_default();
        if notes.as_slice() == self.board.list().notes() && change.unreadable.is_empty() {
            return false;
        }
        self.cancel_drag();
        self.board.repo_mut().keep_unreadable(change.unreadable);
        self.board.replace_all(notes);

        let stale: Vec<NoteId> = self
            .frames
            .ids()
            .filter(|id| !self.board.get(id).is_some_and(Note::has_url))
            .cloned()
            .collect();
        for id in &stale {
            self.frames.unmount(id);
        }
        let list = self.board.list();
        self.nav
            .retain(|id| list.get(id).is_some_and(Note::has_url));
        self.persist_nav();
        self.notify();
        true
    }

    /// Release every frame, observer and timer.
    pub fn teardown(&mut self) {
        self.cancel_drag();
        self.frames.teardown();
        self.persist_nav();
        self.listeners.clear();
        tracing::debug!("panel torn down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::badge::testing::RecordingBadge;
    use crate::frames::testing::FakeHost;
    use crate::messages::FrameCommand;
    use crate::storage::{MemoryStorage, NoteRepository};
    use pretty_assertions::assert_eq;
    use std::cell::Cell;
    use std::rc::Rc;

    type Panel = PanelController<MemoryStorage, RecordingBadge, FakeHost>;

    fn clock() -> i64 {
        1_700_000_000_000
    }

    fn panel_with(host: FakeHost, area: MemoryStorage) -> Panel {
        let cfg = PanelConfig::default();
        let board = NoteBoard::load(
            NoteRepository::new(area, &cfg),
            RecordingBadge::default(),
            &cfg,
        );
        PanelController::new(board, host, &cfg, clock)
    }

    fn panel() -> Panel {
        panel_with(FakeHost::default(), MemoryStorage::new())
    }

    fn url_note(p: &mut Panel, url: &str) -> NoteId {
        let id = p.add_url_note(Some(url)).expect("valid url");
        p.mount_frame(&id, id.to_string()).expect("mount");
        id
    }

    fn load_report(id: &NoteId, ts: i64, url: &str, y: f64) -> ContentReport {
        ContentReport::PageLoad {
            note_id: id.clone(),
            timestamp: ts,
            title: "Page".to_string(),
            url: url.to_string(),
            scroll_x: 0.0,
            scroll_y: y,
        }
    }

    #[test]
    fn test_delete_releases_exactly_one_frame() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example");
        let b = url_note(&mut p, "https://b.example");
        let c = url_note(&mut p, "https://c.example");
        p.frame_resized(&b);

        assert!(p.delete(&b));
        assert_eq!(p.frames().len(), 2);
        assert!(p.frames().contains(&a));
        assert!(p.frames().contains(&c));
        assert_eq!(p.frames().host().frames.len(), 2);
        assert_eq!(p.frames().host().observers.len(), 2);
        assert!(p.frames().host().timers.is_empty());
        assert!(!p.delete(&b));
    }

    #[test]
    fn test_reorder_and_edits_keep_frames_alive() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example");
        let t = p.add_note(Some("text".to_string()));
        let handle = *p.frames().frame(&a).expect("frame");

        p.move_down(&t);
        p.set_color(&t, NoteColor::Blue);
        p.update_content(&t, "changed");
        p.mount_frame(&a, a.to_string()).expect("remount");

        assert_eq!(p.frames().frame(&a), Some(&handle));
        assert_eq!(p.frames().host().created, 1);
    }

    #[test]
    fn test_clearing_url_unmounts_frame() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example");
        assert_eq!(p.set_url(&a, "").expect("clear"), UrlUpdate::Cleared);
        assert!(p.frames().is_empty());
        assert!(p.frames().host().frames.is_empty());
    }

    #[test]
    fn test_settled_resize_persists_height() {
        let mut host = FakeHost::default();
        host.heights.insert("wrapper".to_string(), 420);
        let mut p = panel_with(host, MemoryStorage::new());
        let a = p.add_url_note(Some("https://a.example")).expect("valid url");
        p.mount_frame(&a, "wrapper".to_string()).expect("mount");

        p.frame_resized(&a);
        p.frame_settled(&a);
        assert_eq!(p.notes().get(&a).and_then(|n| n.iframe_height), Some(420));
        let stored = p.board().repo().read_notes().expect("load").map(|d| d.notes).unwrap_or_default();
        assert_eq!(stored[0].iframe_height, Some(420));
        assert!(!p.frames().has_pending_timer(&a));
    }

    #[test]
    fn test_cancelled_drag_leaves_collection_unchanged() {
        let mut p = panel();
        let c = p.add_note(None);
        let _b = p.add_note(None);
        let a = p.add_note(None);
        let before = p.notes().clone();
        let writes = p.board().repo().area().writes();

        p.begin_drag(&a, 100.0).expect("start");
        let rows: Vec<RowBox> = p
            .notes()
            .ids_in_display_order()
            .into_iter()
            .filter(|id| *id != a)
            .enumerate()
            .map(|(i, id)| RowBox {
                id,
                top: i as f64 * 100.0,
                height: 100.0,
            })
            .collect();
        p.drag_moved(500.0, &rows);
        p.cancel_drag();

        assert_eq!(p.notes(), &before);
        assert_eq!(p.board().repo().area().writes(), writes);
        assert!(!p.drag().is_dragging());
        assert!(p.notes().contains(&c));
    }

    #[test]
    fn test_drop_commits_and_restores_frame_input() {
        let mut p = panel();
        let c = url_note(&mut p, "https://c.example");
        let b = p.add_note(None);
        let a = p.add_note(None);

        p.begin_drag(&a, 100.0).expect("start");
        let frame = *p.frames().frame(&c).expect("frame");
        assert!(p.frames().host().pointer_disabled.contains(&frame));

        let rows = vec![
            RowBox {
                id: b.clone(),
                top: 0.0,
                height: 100.0,
            },
            RowBox {
                id: c.clone(),
                top: 100.0,
                height: 100.0,
            },
        ];
        p.drag_moved(190.0, &rows);
        let commit = p.drop_drag().expect("commit");
        assert_eq!((commit.from, commit.to), (0, 2));

        assert_eq!(p.notes().ids_in_display_order(), vec![b, c, a]);
        assert!(p.frames().host().pointer_disabled.is_empty());
        let stored = p.board().repo().read_notes().expect("load").map(|d| d.notes).unwrap_or_default();
        assert_eq!(stored, p.notes().notes().to_vec());
    }

    fn rows_without(p: &Panel, dragged: &NoteId) -> Vec<RowBox> {
        p.notes()
            .ids_in_display_order()
            .into_iter()
            .filter(|id| id != dragged)
            .enumerate()
            .map(|(i, id)| RowBox {
                id,
                top: i as f64 * 100.0,
                height: 100.0,
            })
            .collect()
    }

    #[test]
    fn test_note_added_mid_drag_cancels_gesture() {
        let mut p = panel();
        let c = p.add_note(Some("c".to_string()));
        let b = p.add_note(Some("b".to_string()));
        let a = p.add_note(Some("a".to_string()));

        p.begin_drag(&c, 100.0).expect("start");
        let rows = rows_without(&p, &c);
        p.drag_moved(10.0, &rows);

        p.handle_message(RuntimeMessage::AddNote {
            content: Some("new".to_string()),
        })
        .expect("add");
        assert!(!p.drag().is_dragging());
        assert_eq!(p.drop_drag(), None);

        let order = p.notes().ids_in_display_order();
        assert_eq!(order.len(), 4);
        assert_eq!(&order[1..], &[a, b, c]);
        assert!(p.frames().host().pointer_disabled.is_empty());
    }

    #[test]
    fn test_deleting_another_note_cancels_drag() {
        let mut p = panel();
        let b = p.add_note(None);
        let a = p.add_note(None);

        p.begin_drag(&a, 100.0).expect("start");
        assert!(p.delete(&b));
        assert!(!p.drag().is_dragging());
        assert_eq!(p.drop_drag(), None);
        assert_eq!(p.notes().ids_in_display_order(), vec![a]);
    }

    #[test]
    fn test_frame_resize_during_drag_keeps_input_suspended() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example");
        let t = p.add_note(None);
        let frame = *p.frames().frame(&a).expect("frame");

        p.begin_drag(&t, 100.0).expect("start");
        p.frame_resized(&a);
        p.frame_settled(&a);
        assert!(p.frames().host().pointer_disabled.contains(&frame));

        p.cancel_drag();
        assert!(p.frames().host().pointer_disabled.is_empty());
    }

    #[test]
    fn test_listeners_run_after_changes_only() {
        let mut p = panel();
        let calls = Rc::new(Cell::new(0));
        let seen = calls.clone();
        p.subscribe(move |_| seen.set(seen.get() + 1));

        let a = p.add_note(None);
        p.set_color(&a, NoteColor::Yellow);
        p.move_up(&a);
        p.set_color(&a, NoteColor::Green);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_reload_report_restores_scroll() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example/");
        p.handle_report(&load_report(&a, 1, "https://a.example/", 0.0));
        p.handle_report(&ContentReport::ScrollChange {
            note_id: a.clone(),
            timestamp: 2,
            scroll_x: 0.0,
            scroll_y: 900.0,
        });
        p.handle_report(&load_report(&a, 3, "https://a.example/", 0.0));

        let frame = *p.frames().frame(&a).expect("frame");
        assert_eq!(
            p.frames().host().posted,
            vec![(
                frame,
                FrameCommand::RestoreState {
                    scroll_x: 0.0,
                    scroll_y: 900.0
                }
            )]
        );
        assert!(p.board().repo().area().raw("frameStates").is_some());
    }

    #[test]
    fn test_reports_for_unknown_notes_are_ignored() {
        let mut p = panel();
        p.handle_report(&load_report(&NoteId::from("ghost"), 1, "https://x/", 0.0));
        assert!(p.nav().states().is_empty());
    }

    #[test]
    fn test_delete_forgets_frame_state() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example/");
        p.handle_report(&load_report(&a, 1, "https://a.example/", 10.0));
        assert!(p.nav().get(&a).is_some());
        p.delete(&a);
        assert!(p.nav().get(&a).is_none());
        assert_eq!(p.board().repo().area().raw("frameStates"), None);
    }

    #[test]
    fn test_handle_message_dispatch() {
        let mut p = panel();
        p.handle_message(RuntimeMessage::AddNote {
            content: Some("from shortcut".to_string()),
        })
        .expect("add");
        p.handle_message(RuntimeMessage::AddUrlNote {
            url: Some("example.com".to_string()),
        })
        .expect("add url");
        p.handle_message(RuntimeMessage::PanelReady).expect("ignored");
        assert!(p
            .handle_message(RuntimeMessage::AddUrlNote {
                url: Some("ftp://nope".to_string()),
            })
            .is_err());

        let sorted = p.notes().sorted();
        assert_eq!(sorted.len(), 2);
        assert_eq!(sorted[0].frame_url(), Some("https://example.com/"));
        assert_eq!(sorted[1].content, "from shortcut");
    }

    #[test]
    fn test_external_change_unmounts_vanished_frames() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example");
        let b = url_note(&mut p, "https://b.example");

        let kept: Vec<Note> = p
            .notes()
            .notes()
            .iter()
            .filter(|n| n.id == b)
            .cloned()
            .collect();
        assert!(p.external_change(StorageChange {
            notes: Some(kept.clone()),
            unreadable: vec![],
        }));
        assert!(!p.external_change(StorageChange {
            notes: Some(kept),
            unreadable: vec![],
        }));

        assert!(!p.frames().contains(&a));
        assert!(p.frames().contains(&b));
        assert_eq!(p.notes().len(), 1);

        p.external_change(StorageChange {
            notes: None,
            unreadable: vec![],
        });
        assert!(p.frames().is_empty());
        assert!(p.notes().is_empty());
    }

    #[test]
    fn test_teardown_releases_all_frames() {
        let mut p = panel();
        let a = url_note(&mut p, "https://a.example");
        url_note(&mut p, "https://b.example");
        p.frame_resized(&a);
        p.begin_drag(&a, 50.0).expect("start");

        p.teardown();
        assert!(p.frames().is_empty());
        assert!(p.frames().host().timers.is_empty());
        assert!(!p.drag().is_dragging());
    }
}
