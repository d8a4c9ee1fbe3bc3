//! Tracks what each embedded page last reported so a remounted frame can be
//! scrolled back to where the user left it.

use crate::messages::{ContentReport, FrameCommand};
use crate::models::{FrameNavState, NoteId};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Default)]
pub struct FrameNavTracker {
    states: BTreeMap<NoteId, FrameNavState>,
    dirty: bool,
}

impl FrameNavTracker {
    pub fn new(states: BTreeMap<NoteId, FrameNavState>) -> Self {
        Self {
            states,
            dirty: false,
        }
    }

    pub fn states(&self) -> &BTreeMap<NoteId, FrameNavState> {
        &self.states
    }

    pub fn get(&self, id: &NoteId) -> Option<&FrameNavState> {
        self.states.get(id)
    }

    /// Whether anything changed since the last [`take_dirty`](Self::take_dirty).
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Drop state for a deleted note or one whose URL was cleared.
    pub fn forget(&mut self, id: &NoteId) -> bool {
        let removed = self.states.remove(id).is_some();
        self.dirty |= removed;
        removed
    }

    /// Keep only notes for which `keep` holds.
    pub fn retain(&mut self, mut keep: impl FnMut(&NoteId) -> bool) {
        let before = self.states.len();
        self.states.retain(|id, _| keep(id));
        self.dirty |= self.states.len() != before;
    }

    /// Record a report. Returns a restore command when a page finished loading
    /// the same URL we have a saved scroll position for.
    pub fn apply(&mut self, report: &ContentReport) -> Option<FrameCommand> {
        let id = report.note_id().clone();
        let ts = report.timestamp();
        let state = self.states.entry(id).or_default();

        if ts < state.updated_at {
            tracing::debug!(note = %report.note_id(), ts, "stale frame report ignored");
            return None;
        }

        let before = state.clone();
        let mut command = None;
        match report {
            ContentReport::PageLoad {
                title,
                url,
                scroll_x,
                scroll_y,
                ..
            } => {
                let same_page = !state.url.is_empty() && state.url == *url;
                let at_top = *scroll_x == 0.0 && *scroll_y == 0.0;
                if same_page && state.has_scroll() && at_top {
                    command = Some(FrameCommand::RestoreState {
                        scroll_x: state.scroll_x,
                        scroll_y: state.scroll_y,
                    });
                } else {
                    state.scroll_x = *scroll_x;
                    state.scroll_y = *scroll_y;
                }
                state.title = title.clone();
                state.url = url.clone();
            }
            ContentReport::TitleChange { title, .. } => {
                state.title = title.clone();
            }
            ContentReport::ScrollChange {
                scroll_x, scroll_y, ..
            } => {
                state.scroll_x = *scroll_x;
                state.scroll_y = *scroll_y;
            }
            ContentReport::UrlChange { url, title, .. } => {
                if state.url != *url {
                    state.scroll_x = 0.0;
                    state.scroll_y = 0.0;
                }
                state.url = url.clone();
                state.title = title.clone();
            }
            ContentReport::PageUnload {
                url,
                scroll_x,
                scroll_y,
                ..
            } => {
                state.url = url.clone();
                state.scroll_x = *scroll_x;
                state.scroll_y = *scroll_y;
            }
        }
        state.updated_at = ts;

        if *state != before {
            self.dirty = true;
        }
        command
    }
}
