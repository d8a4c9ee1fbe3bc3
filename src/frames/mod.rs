//! Lifecycle of the embedded frames hosted inside URL notes.
//!
//! One registry entry per note id holds the frame, its size observer and its
//! pending resize timer. Entries survive re-renders and reorders; only a
//! cleared URL or a deleted note tears one down.

pub mod nav;
pub mod web;

use crate::error::FrameError;
use crate::messages::FrameCommand;
use crate::models::{Note, NoteId};
use std::collections::HashMap;

/// Platform primitives needed to host frames.
pub trait FrameHost {
    /// Element the frame is placed in and whose size is observed.
    type Container;
    type Frame;
    type Observer;
    type Timer;

    fn create_frame(
        &mut self,
        note_id: &NoteId,
        url: &str,
        container: &Self::Container,
        initial_height: Option<u32>,
    ) -> Result<Self::Frame, FrameError>;

    fn navigate(&mut self, frame: &Self::Frame, url: &str) -> Result<(), FrameError>;

    fn remove_frame(&mut self, frame: Self::Frame);

    fn observe(
        &mut self,
        note_id: &NoteId,
        container: &Self::Container,
    ) -> Result<Self::Observer, FrameError>;

    fn disconnect(&mut self, observer: Self::Observer);

    fn set_pointer_events(&mut self, frame: &Self::Frame, enabled: bool);

    fn measure_height(&self, container: &Self::Container) -> Option<u32>;

    /// One-shot timer that reports back through [`FrameManager::on_resize_settled`].
    fn start_timer(&mut self, note_id: &NoteId, delay_ms: u32) -> Self::Timer;

    fn cancel_timer(&mut self, timer: Self::Timer);

    fn post(&mut self, frame: &Self::Frame, command: &FrameCommand) -> Result<(), FrameError>;
}

struct FrameEntry<H: FrameHost> {
    container: H::Container,
    frame: H::Frame,
    observer: Option<H::Observer>,
    timer: Option<H::Timer>,
    /// Address last assigned by the panel (the page may have navigated since).
    requested_url: String,
    last_height: Option<u32>,
}

/// Result of [`FrameManager::mount`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MountOutcome {
    Created,
    Navigated,
    Unchanged,
    /// The note has no URL; any existing frame was removed.
    Cleared,
}

pub struct FrameManager<H: FrameHost> {
    host: H,
    entries: HashMap<NoteId, FrameEntry<H>>,
    debounce_ms: u32,
    /// Cleared while a drag is active; applies to frames mounted meanwhile too.
    input_enabled: bool,
}

impl<H: FrameHost> FrameManager<H> {
    pub fn new(host: H, debounce_ms: u32) -> Self {
        Self {
            host,
            entries: HashMap::new(),
            debounce_ms,
            input_enabled: true,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn frame(&self, id: &NoteId) -> Option<&H::Frame> {
        self.entries.get(id).map(|e| &e.frame)
    }

    pub fn ids(&self) -> impl Iterator<Item = &NoteId> {
        self.entries.keys()
    }

    pub fn has_pending_timer(&self, id: &NoteId) -> bool {
        self.entries.get(id).is_some_and(|e| e.timer.is_some())
    }

    /// Create, reuse or retarget the frame for `note`.
    pub fn mount(
        &mut self,
        note: &Note,
        container: H::Container,
    ) -> Result<MountOutcome, FrameError> {
        let Some(url) = note.frame_url() else {
            return Ok(if self.unmount(&note.id) {
                MountOutcome::Cleared
            } else {
                MountOutcome::Unchanged
            });
        };

        if let Some(entry) = self.entries.get_mut(&note.id) {
            if entry.requested_url == url {
                return Ok(MountOutcome::Unchanged);
            }
            self.host.navigate(&entry.frame, url)?;
            tracing::debug!(note = %note.id, url, "frame retargeted");
            entry.requested_url = url.to_string();
            return Ok(MountOutcome::Navigated);
        }

        let frame = self
            .host
            .create_frame(&note.id, url, &container, note.iframe_height)?;
        let observer = match self.host.observe(&note.id, &container) {
            Ok(o) => Some(o),
            Err(e) => {
                tracing::warn!(note = %note.id, error = %e, "frame mounted without size tracking");
                None
            }
        };
        if !self.input_enabled {
            self.host.set_pointer_events(&frame, false);
        }
        tracing::debug!(note = %note.id, url, "frame created");
        self.entries.insert(
            note.id.clone(),
            FrameEntry {
                container,
                frame,
                observer,
                timer: None,
                requested_url: url.to_string(),
                last_height: note.iframe_height,
            },
        );
        Ok(MountOutcome::Created)
    }

    /// Size observer fired: suspend pointer input and restart the debounce.
    pub fn on_resize(&mut self, id: &NoteId) {
        let Some(entry) = self.entries.get_mut(id) else {
            return;
        };
        self.host.set_pointer_events(&entry.frame, false);
        if let Some(t) = entry.timer.take() {
            self.host.cancel_timer(t);
        }
        entry.timer = Some(self.host.start_timer(id, self.debounce_ms));
    }

    /// Debounce elapsed: measure and re-enable input unless input is
    /// suspended. Returns the new height if it changed.
    pub fn on_resize_settled(&mut self, id: &NoteId) -> Option<u32> {
        let entry = self.entries.get_mut(id)?;
        // The timer has fired; dropping the handle is all that's left.
        entry.timer = None;
        let measured = self.host.measure_height(&entry.container);
        if self.input_enabled {
            self.host.set_pointer_events(&entry.frame, true);
        }

        let height = measured?;
        if entry.last_height == Some(height) {
            return None;
        }
        entry.last_height = Some(height);
        Some(height)
    }

    /// Tear down everything registered for `id`. Returns whether an entry existed.
    pub fn unmount(&mut self, id: &NoteId) -> bool {
        let Some(entry) = self.entries.remove(id) else {
            return false;
        };
        if let Some(o) = entry.observer {
            self.host.disconnect(o);
        }
        if let Some(t) = entry.timer {
            self.host.cancel_timer(t);
        }
        self.host.remove_frame(entry.frame);
        tracing::debug!(note = %id, "frame removed");
        true
    }

    /// Suspend or restore pointer input on every frame (while a drag is active).
    /// Frames still waiting on a resize debounce stay suspended.
    pub fn set_input_enabled(&mut self, enabled: bool) {
        self.input_enabled = enabled;
        for entry in self.entries.values() {
            if enabled && entry.timer.is_some() {
                continue;
            }
            self.host.set_pointer_events(&entry.frame, enabled);
        }
    }

    pub fn post_command(&mut self, id: &NoteId, command: &FrameCommand) -> Result<(), FrameError> {
        let entry = self
            .entries
            .get(id)
            .ok_or_else(|| FrameError::Missing(id.clone()))?;
        self.host.post(&entry.frame, command)
    }

    /// Unmount every frame (panel teardown).
    pub fn teardown(&mut self) {
        let ids: Vec<NoteId> = self.entries.keys().cloned().collect();
        for id in ids {
            self.unmount(&id);
        }
    }
}
