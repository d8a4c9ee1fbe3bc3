//! User-facing note commands over the single in-memory collection.
//!
//! Every command that changes something persists the whole collection and
//! refreshes the badge before returning. Storage failures are logged and
//! otherwise ignored; the in-memory list stays authoritative until the next
//! successful write. A collection that could not be read is never
//! overwritten: the board keeps working in memory until another page stores
//! a readable one.

use crate::badge::{BadgeLabel, BadgeSink};
use crate::config::PanelConfig;
use crate::error::{PanelError, Result};
use crate::models::{Note, NoteColor, NoteId};
use crate::ordering::NoteList;
use crate::storage::{NoteRepository, StorageArea};

/// Normalize user URL input: trims, defaults the scheme to `https`, and only
/// accepts `http(s)` addresses with a host.
pub fn normalize_url(input: &str) -> Result<String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(PanelError::InvalidUrl("address is empty".to_string()));
    }

    let candidate = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    };

    let parsed = url::Url::parse(&candidate)
        .map_err(|e| PanelError::InvalidUrl(format!("{trimmed}: {e}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(PanelError::InvalidUrl(format!(
            "{trimmed}: only http and https pages can be embedded"
        )));
    }
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(parsed.to_string()),
        _ => Err(PanelError::InvalidUrl(format!("{trimmed}: missing host"))),
    }
}

/// Result of [`NoteBoard::set_url`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UrlUpdate {
    Set(String),
    Cleared,
    Unchanged,
}

pub struct NoteBoard<A, B> {
    list: NoteList,
    repo: NoteRepository<A>,
    badge: B,
    badge_color: String,
    shown_count: Option<usize>,
    /// False while the stored collection is unreadable.
    writable: bool,
}

impl<A: StorageArea, B: BadgeSink> NoteBoard<A, B> {
    /// Load the stored collection, repairing missing orders.
    pub fn load(mut repo: NoteRepository<A>, badge: B, config: &PanelConfig) -> Self {
        let (notes, writable) = match repo.load_notes() {
            Ok(notes) => (notes.unwrap_or_default(), true),
            Err(e) => {
                tracing::warn!(error = %e, "could not read notes; starting empty without saving");
                (Vec::new(), false)
            }
        };

        let mut board = Self {
            list: NoteList::new(notes),
            repo,
            badge,
            badge_color: config.badge_color.clone(),
            shown_count: None,
            writable,
        };

        if board.list.migrate() {
            tracing::info!(count = board.list.len(), "assigned order to legacy notes");
            board.persist();
        }
        board.refresh_badge();
        board
    }

    pub fn list(&self) -> &NoteList {
        &self.list
    }

    pub fn get(&self, id: &NoteId) -> Option<&Note> {
        self.list.get(id)
    }

    pub fn repo(&self) -> &NoteRepository<A> {
        &self.repo
    }

    pub fn repo_mut(&mut self) -> &mut NoteRepository<A> {
        &mut self.repo
    }

    pub fn badge(&self) -> &B {
        &self.badge
    }

    /// Whether changes reach storage.
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    fn persist(&mut self) {
        if !self.writable {
            tracing::warn!("stored notes are unreadable; change kept in memory only");
            return;
        }
        if let Err(e) = self.repo.save_notes(self.list.notes()) {
            tracing::warn!(error = %e, "could not persist notes");
        }
    }

    fn refresh_badge(&mut self) {
        let count = self.list.len();
        if self.shown_count == Some(count) {
            return;
        }
        self.badge
            .show(&BadgeLabel::for_count(count, &self.badge_color));
        self.shown_count = Some(count);
    }

    /// Persist and notify after a mutation.
    fn commit(&mut self) {
        self.persist();
        self.refresh_badge();
    }

    /// New text note at the top, in edit mode.
    pub fn add_note(&mut self, content: Option<String>, created_at: i64) -> NoteId {
        let mut note = Note::new(NoteId::generate(), created_at);
        if let Some(c) = content {
            note.is_editing = c.trim().is_empty();
            note.content = c;
        }
        let id = note.id.clone();
        self.list.insert_at_top(note);
        self.commit();
        id
    }

    /// New URL note at the top. Without a URL the note waits for the user to enter one.
    pub fn add_url_note(&mut self, url: Option<&str>, created_at: i64) -> Result<NoteId> {
        let url = match url.map(str::trim).filter(|u| !u.is_empty()) {
            Some(u) => normalize_url(u)?,
            None => String::new(),
        };
        let mut note = Note::new(NoteId::generate(), created_at);
        note.is_editing = url.is_empty();
        note.url = Some(url);
        let id = note.id.clone();
        self.list.insert_at_top(note);
        self.commit();
        Ok(id)
    }

    pub fn delete(&mut self, id: &NoteId) -> Option<Note> {
        let removed = self.list.delete(id)?;
        self.commit();
        Some(removed)
    }

    pub fn set_color(&mut self, id: &NoteId, color: NoteColor) -> bool {
        let Some(note) = self.list.get_mut(id) else {
            return false;
        };
        if note.color == color {
            return false;
        }
        note.color = color;
        self.commit();
        true
    }

    /// Set or clear (blank input) the embedded URL. Invalid input changes nothing.
    pub fn set_url(&mut self, id: &NoteId, input: &str) -> Result<UrlUpdate> {
        let next = if input.trim().is_empty() {
            None
        } else {
            Some(normalize_url(input)?)
        };
        let Some(note) = self.list.get_mut(id) else {
            return Ok(UrlUpdate::Unchanged);
        };
        if note.frame_url() == next.as_deref() && note.url.is_some() == next.is_some() {
            return Ok(UrlUpdate::Unchanged);
        }

        let update = match &next {
            Some(u) => UrlUpdate::Set(u.clone()),
            None => UrlUpdate::Cleared,
        };
        note.url = next;
        if update == UrlUpdate::Cleared {
            note.iframe_height = None;
            note.is_editing = note.content.trim().is_empty();
        }
        self.commit();
        Ok(update)
    }

    pub fn update_content(&mut self, id: &NoteId, text: &str) -> bool {
        let Some(note) = self.list.get_mut(id) else {
            return false;
        };
        if note.content == text {
            return false;
        }
        note.content = text.to_string();
        self.commit();
        true
    }

    /// Flip edit/preview. A blank text note stays in edit mode; URL notes ignore this.
    pub fn toggle_edit(&mut self, id: &NoteId) -> bool {
        let Some(note) = self.list.get_mut(id) else {
            return false;
        };
        if note.has_url() {
            return false;
        }
        if note.is_editing && note.content.trim().is_empty() {
            return false;
        }
        note.is_editing = !note.is_editing;
        self.commit();
        true
    }

    pub fn set_iframe_height(&mut self, id: &NoteId, height: u32) -> bool {
        let Some(note) = self.list.get_mut(id) else {
            return false;
        };
        if note.iframe_height == Some(height) {
            return false;
        }
        note.iframe_height = Some(height);
        self.commit();
        true
    }

    pub fn move_up(&mut self, id: &NoteId) -> bool {
        let moved = self.list.move_up(id);
        if moved {
            self.commit();
        }
        moved
    }

    pub fn move_down(&mut self, id: &NoteId) -> bool {
        let moved = self.list.move_down(id);
        if moved {
            self.commit();
        }
        moved
    }

    pub fn move_to_index(&mut self, id: &NoteId, to: usize) -> bool {
        let moved = self.list.move_to_index(id, to);
        if moved {
            self.commit();
        }
        moved
    }

    /// Adopt a collection written by another page. Only written back if it needed migrating.
    pub fn replace_all(&mut self, notes: Vec<Note>) {
        self.writable = true;
        self.list.replace(notes);
        if self.list.migrate() {
            self.persist();
        }
        self.refresh_badge();
    }
}
