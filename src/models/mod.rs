use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque, stable note identifier.
///
/// Stored notes written by older panel builds carry timestamps here, as JSON
/// numbers or strings, so any scalar is accepted and kept as its text.
#[derive(Serialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Fresh random id (UUID v4).
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawNoteId {
    Text(String),
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl<'de> Deserialize<'de> for NoteId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = match RawNoteId::deserialize(deserializer)? {
            RawNoteId::Text(s) => s,
            RawNoteId::Signed(n) => n.to_string(),
            RawNoteId::Unsigned(n) => n.to_string(),
            RawNoteId::Float(f) if f.fract() == 0.0 && f.abs() < 9.0e15 => (f as i64).to_string(),
            RawNoteId::Float(f) => f.to_string(),
        };
        Ok(Self(text))
    }
}

impl From<&str> for NoteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NoteId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Closed palette of note themes.
#[derive(
    Serialize,
    Deserialize,
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::AsRefStr,
    strum::EnumIter,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum NoteColor {
    #[default]
    Yellow,
    Green,
    Blue,
    Pink,
    Purple,
    Gray,
}

impl NoteColor {
    /// Card background class for the panel view.
    pub fn card_class(self) -> &'static str {
        match self {
            NoteColor::Yellow => "bg-yellow-100 border-yellow-300",
            NoteColor::Green => "bg-green-100 border-green-300",
            NoteColor::Blue => "bg-sky-100 border-sky-300",
            NoteColor::Pink => "bg-pink-100 border-pink-300",
            NoteColor::Purple => "bg-violet-100 border-violet-300",
            NoteColor::Gray => "bg-zinc-100 border-zinc-300",
        }
    }

    pub fn swatch_class(self) -> &'static str {
        match self {
            NoteColor::Yellow => "bg-yellow-300",
            NoteColor::Green => "bg-green-300",
            NoteColor::Blue => "bg-sky-300",
            NoteColor::Pink => "bg-pink-300",
            NoteColor::Purple => "bg-violet-300",
            NoteColor::Gray => "bg-zinc-300",
        }
    }
}

/// Unknown palette entries (e.g. written by a newer build) fall back to the default.
fn lenient_color<'de, D: Deserializer<'de>>(d: D) -> Result<NoteColor, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(serde_json::from_value(v).unwrap_or_default())
}

/// Accept any integral JSON number; everything else means "no order yet".
fn lenient_order<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(match v {
        serde_json::Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0)
                .map(|f| f as i64)
        }),
        _ => None,
    })
}

fn lenient_height<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
    let v = serde_json::Value::deserialize(d)?;
    Ok(v.as_f64()
        .filter(|f| f.is_finite() && *f >= 0.0)
        .map(|f| f.round() as u32))
}

/// How a note is presented in the panel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DisplayMode {
    /// Embedded webpage.
    Frame,
    /// Editable Markdown source.
    Editor,
    /// Rendered Markdown.
    Preview,
}

/// A persisted sticky note.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Note {
    pub id: NoteId,

    #[serde(default)]
    pub content: String,

    #[serde(default, deserialize_with = "lenient_color")]
    pub color: NoteColor,

    #[serde(rename = "createdAt", default)]
    pub created_at: i64,

    #[serde(rename = "isEditing", default)]
    pub is_editing: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(
        rename = "iframeHeight",
        default,
        deserialize_with = "lenient_height",
        skip_serializing_if = "Option::is_none"
    )]
    pub iframe_height: Option<u32>,

    #[serde(
        default,
        deserialize_with = "lenient_order",
        skip_serializing_if = "Option::is_none"
    )]
    pub order: Option<i64>,
}

impl Note {
    /// New empty text note, opened in edit mode. `order` is assigned on insertion.
    pub fn new(id: NoteId, created_at: i64) -> Self {
        Self {
            id,
            content: String::new(),
            color: NoteColor::default(),
            created_at,
            is_editing: true,
            url: None,
            iframe_height: None,
            order: None,
        }
    }

    /// Embedded URL, if any. Blank strings count as absent.
    pub fn frame_url(&self) -> Option<&str> {
        self.url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
    }

    pub fn has_url(&self) -> bool {
        self.frame_url().is_some()
    }

    /// Created as a web page note but no address entered yet.
    pub fn awaits_url(&self) -> bool {
        self.url.is_some() && !self.has_url()
    }

    pub fn display_mode(&self) -> DisplayMode {
        if self.has_url() {
            DisplayMode::Frame
        } else if self.is_editing || self.content.trim().is_empty() {
            DisplayMode::Editor
        } else {
            DisplayMode::Preview
        }
    }
}

/// Last known navigation state of an embedded page.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct FrameNavState {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub url: String,

    #[serde(rename = "scrollX", default)]
    pub scroll_x: f64,

    #[serde(rename = "scrollY", default)]
    pub scroll_y: f64,

    #[serde(rename = "updatedAt", default)]
    pub updated_at: i64,
}

impl FrameNavState {
    pub fn has_scroll(&self) -> bool {
        self.scroll_x != 0.0 || self.scroll_y != 0.0
    }
}
