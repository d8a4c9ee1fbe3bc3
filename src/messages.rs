//! Payloads exchanged between the panel, the background worker and the
//! content agents running inside embedded pages.

use crate::models::NoteId;
use serde::{Deserialize, Serialize};

/// Messages carried by the extension runtime transport.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum RuntimeMessage {
    /// Panel → background: the panel UI is mounted and listening.
    PanelReady,

    /// Background → panel: create a text note.
    AddNote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        content: Option<String>,
    },

    /// Background → panel: create a URL note, optionally pre-filled.
    AddUrlNote {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },

    /// Content agent → panel: navigation state of an embedded page.
    FrameReport { report: ContentReport },
}

impl RuntimeMessage {
    pub fn action(&self) -> &'static str {
        match self {
            RuntimeMessage::PanelReady => "panelReady",
            RuntimeMessage::AddNote { .. } => "addNote",
            RuntimeMessage::AddUrlNote { .. } => "addUrlNote",
            RuntimeMessage::FrameReport { .. } => "frameReport",
        }
    }

    /// Identity used by the relay's fallback path: action name plus the payload key.
    pub fn dedup_key(&self) -> MessageKey {
        let payload = match self {
            RuntimeMessage::PanelReady => None,
            RuntimeMessage::AddNote { content } => content.clone(),
            RuntimeMessage::AddUrlNote { url } => url.clone(),
            RuntimeMessage::FrameReport { report } => Some(report.note_id().to_string()),
        };
        MessageKey {
            action: self.action(),
            payload,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageKey {
    pub action: &'static str,
    pub payload: Option<String>,
}

/// Events reported by the content agent inside an embedded page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentReport {
    #[serde(rename_all = "camelCase")]
    PageLoad {
        note_id: NoteId,
        timestamp: i64,
        title: String,
        url: String,
        scroll_x: f64,
        scroll_y: f64,
    },
    #[serde(rename_all = "camelCase")]
    TitleChange {
        note_id: NoteId,
        timestamp: i64,
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    ScrollChange {
        note_id: NoteId,
        timestamp: i64,
        scroll_x: f64,
        scroll_y: f64,
    },
    #[serde(rename_all = "camelCase")]
    UrlChange {
        note_id: NoteId,
        timestamp: i64,
        url: String,
        title: String,
    },
    #[serde(rename_all = "camelCase")]
    PageUnload {
        note_id: NoteId,
        timestamp: i64,
        url: String,
        scroll_x: f64,
        scroll_y: f64,
    },
}

impl ContentReport {
    pub fn note_id(&self) -> &NoteId {
        match self {
            ContentReport::PageLoad { note_id, .. }
            | ContentReport::TitleChange { note_id, .. }
            | ContentReport::ScrollChange { note_id, .. }
            | ContentReport::UrlChange { note_id, .. }
            | ContentReport::PageUnload { note_id, .. } => note_id,
        }
    }

    pub fn timestamp(&self) -> i64 {
        match self {
            ContentReport::PageLoad { timestamp, .. }
            | ContentReport::TitleChange { timestamp, .. }
            | ContentReport::ScrollChange { timestamp, .. }
            | ContentReport::UrlChange { timestamp, .. }
            | ContentReport::PageUnload { timestamp, .. } => *timestamp,
        }
    }
}

/// Commands the panel posts into an embedded page.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum FrameCommand {
    #[serde(rename_all = "camelCase")]
    RestoreState { scroll_x: f64, scroll_y: f64 },
}

/// Named commands from keyboard shortcuts and context-menu entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::EnumString, strum::AsRefStr, strum::EnumIter)]
#[strum(serialize_all = "kebab-case")]
pub enum PanelCommand {
    /// New empty text note.
    AddNote,
    /// New URL note with an empty address field.
    AddUrlNote,
    /// New URL note pre-filled with the current page.
    AddPageNote,
}
